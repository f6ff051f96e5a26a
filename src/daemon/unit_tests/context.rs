// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use calico_libnetwork::{
    CalicoDatastoreType, CalicoLogger, CalicoPluginDriver, ErrorKind,
};

use super::{write_config_file, MEMORY_CONFIG};
use crate::context::CalicoStartupContext;

#[tokio::test]
async fn test_context_missing_config_file() {
    let e = CalicoStartupContext::new(
        "/tmp/calico-no-such-dir/calicoctl.cfg",
        CalicoLogger::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ConfigError);
    assert!(e.msg().starts_with("Config loading error"));
}

#[tokio::test]
async fn test_context_invalid_config_content() {
    let file = write_config_file(
        "apiVersion: v1\nkind: calicoApiConfig\nspec:\n  datastoreType: foo\n",
    );
    let e = CalicoStartupContext::new(
        file.path().to_str().unwrap(),
        CalicoLogger::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ConfigError);
    assert!(e.msg().starts_with("Config loading error"));
}

#[tokio::test]
async fn test_context_unreachable_etcd() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let file = write_config_file(&format!(
        "apiVersion: v1\nkind: calicoApiConfig\nspec:\n  \
         datastoreType: etcdv2\n  etcdEndpoints: http://{addr}\n"
    ));

    let e = CalicoStartupContext::new(
        file.path().to_str().unwrap(),
        CalicoLogger::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::ClientError);
    assert!(e.to_string().contains("Client instantiation error"));
}

#[tokio::test]
async fn test_context_drivers_share_client() {
    let file = write_config_file(MEMORY_CONFIG);
    let ctx = CalicoStartupContext::new(
        file.path().to_str().unwrap(),
        CalicoLogger::default(),
    )
    .await
    .unwrap();

    let network = ctx.network_driver();
    let ipam = ctx.ipam_driver();
    assert!(Arc::ptr_eq(network.client(), ipam.client()));
    assert_eq!(
        network.client().datastore_type(),
        CalicoDatastoreType::Memory
    );
}

#[tokio::test]
async fn test_context_new_client_per_run() {
    let file = write_config_file(MEMORY_CONFIG);
    let path = file.path().to_str().unwrap();
    let ctx1 = CalicoStartupContext::new(path, CalicoLogger::default())
        .await
        .unwrap();
    let ctx2 = CalicoStartupContext::new(path, CalicoLogger::default())
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(
        ctx1.network_driver().client(),
        ctx2.network_driver().client()
    ));
}

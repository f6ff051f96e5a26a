// SPDX-License-Identifier: Apache-2.0

use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    CalicoClientConfig, CalicoDatastoreClient, CalicoDatastoreType,
    CalicoIpamDriver, CalicoLogger, CalicoNetworkDriver, CalicoPluginServer,
    ErrorKind, PLUGIN_CONTENT_TYPE,
};

async fn new_memory_client() -> Arc<CalicoDatastoreClient> {
    Arc::new(
        CalicoDatastoreClient::new(CalicoClientConfig {
            datastore_type: CalicoDatastoreType::Memory,
            ..Default::default()
        })
        .await
        .unwrap(),
    )
}

async fn wait_socket(path: &Path) {
    for _ in 0..500 {
        if std::fs::metadata(path)
            .map(|m| m.file_type().is_socket())
            .unwrap_or_default()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Socket {} not created", path.display());
}

async fn plugin_post(
    socket_path: &Path,
    method: &str,
    body: &str,
) -> (u16, String, Value) {
    let client: Client<_, Full<Bytes>> =
        Client::builder(TokioExecutor::new()).build(hyperlocal::UnixConnector);
    let uri = hyperlocal::Uri::new(socket_path, &format!("/{method}"));
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let reply = client.request(req).await.unwrap();
    let status = reply.status().as_u16();
    let content_type = reply
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = reply.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_server_serve_network_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(
        CalicoPluginServer::new(CalicoNetworkDriver::new(
            new_memory_client().await,
            CalicoLogger::default(),
        ))
        // Not created yet, server should create it
        .with_socket_dir(&dir.path().join("plugins")),
    );
    let socket_path = server.socket_path("calico");
    let shutdown = CancellationToken::new();

    let server_clone = server.clone();
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(async move {
        server_clone.serve_unix("", "calico", shutdown_clone).await
    });
    wait_socket(&socket_path).await;

    let (status, content_type, reply) =
        plugin_post(&socket_path, "Plugin.Activate", "").await;
    assert_eq!(status, 200);
    assert_eq!(content_type, PLUGIN_CONTENT_TYPE);
    assert_eq!(reply, json!({"Implements": ["NetworkDriver"]}));

    let (status, _, reply) =
        plugin_post(&socket_path, "NetworkDriver.GetCapabilities", "{}").await;
    assert_eq!(status, 200);
    assert_eq!(reply["Scope"], "global");

    let (status, _, reply) = plugin_post(
        &socket_path,
        "NetworkDriver.CreateNetwork",
        r#"{"NetworkID": "abc"}"#,
    )
    .await;
    assert_eq!(status, 500);
    assert!(reply["Err"].as_str().unwrap().contains("CreateNetwork"));

    let (status, _, reply) =
        plugin_post(&socket_path, "NetworkDriver.Join", "{not json").await;
    assert_eq!(status, 500);
    assert!(reply["Err"].is_string());

    let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o660);

    shutdown.cancel();
    let result = handle.await.unwrap();
    assert!(result.is_ok());
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn test_server_socket_owned_by_identity_group() {
    let group =
        nix::unistd::Group::from_gid(nix::unistd::getgid()).unwrap().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(
        CalicoPluginServer::new(CalicoIpamDriver::new(
            new_memory_client().await,
            CalicoLogger::default(),
        ))
        .with_socket_dir(dir.path()),
    );
    let socket_path = server.socket_path("calico-ipam");
    // Stale socket file from previous run
    std::fs::write(&socket_path, "stale").unwrap();
    let shutdown = CancellationToken::new();

    let server_clone = server.clone();
    let shutdown_clone = shutdown.clone();
    let group_name = group.name.clone();
    let handle = tokio::spawn(async move {
        server_clone
            .serve_unix(&group_name, "calico-ipam", shutdown_clone)
            .await
    });
    wait_socket(&socket_path).await;

    let (status, _, reply) =
        plugin_post(&socket_path, "Plugin.Activate", "null").await;
    assert_eq!(status, 200);
    assert_eq!(reply, json!({"Implements": ["IpamDriver"]}));
    assert_eq!(
        std::fs::metadata(&socket_path).unwrap().gid(),
        group.gid.as_raw()
    );

    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_server_unknown_identity() {
    let dir = tempfile::tempdir().unwrap();
    let server = CalicoPluginServer::new(CalicoNetworkDriver::new(
        new_memory_client().await,
        CalicoLogger::default(),
    ))
    .with_socket_dir(dir.path());
    let result = server
        .serve_unix(
            "calico-no-such-group",
            "calico",
            CancellationToken::new(),
        )
        .await;
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::IpcFailure);
    }
    assert!(!server.socket_path("calico").exists());
}

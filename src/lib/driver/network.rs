// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde_json::{json, Value};

use crate::{CalicoDatastoreClient, CalicoLogger, CalicoPluginDriver};

/// Handle of the network plugin role.
#[derive(Debug, Clone)]
pub struct CalicoNetworkDriver {
    client: Arc<CalicoDatastoreClient>,
    logger: CalicoLogger,
}

impl CalicoNetworkDriver {
    pub fn new(
        client: Arc<CalicoDatastoreClient>,
        logger: CalicoLogger,
    ) -> Self {
        Self { client, logger }
    }
}

impl CalicoPluginDriver for CalicoNetworkDriver {
    const PLUGIN_NAME: &'static str = "calico";
    const IMPLEMENTS: &'static str = "NetworkDriver";
    const METHODS: &'static [&'static str] = &[
        "GetCapabilities",
        "CreateNetwork",
        "DeleteNetwork",
        "AllocateNetwork",
        "FreeNetwork",
        "CreateEndpoint",
        "DeleteEndpoint",
        "EndpointOperInfo",
        "Join",
        "Leave",
        "DiscoverNew",
        "DiscoverDelete",
        "ProgramExternalConnectivity",
        "RevokeExternalConnectivity",
    ];

    fn client(&self) -> &Arc<CalicoDatastoreClient> {
        &self.client
    }

    fn logger(&self) -> &CalicoLogger {
        &self.logger
    }

    fn handle_query(&self, method: &str) -> Option<Value> {
        match method {
            // Networks are stored in the shared datastore, hence visible to
            // every host of the cluster.
            "GetCapabilities" => Some(json!({
                "Scope": "global",
                "ConnectivityScope": "global",
            })),
            // Node discovery is not used, just acknowledge.
            "DiscoverNew" | "DiscoverDelete" => Some(json!({})),
            _ => None,
        }
    }
}

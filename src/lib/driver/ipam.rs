// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde_json::{json, Value};

use crate::{CalicoDatastoreClient, CalicoLogger, CalicoPluginDriver};

/// Handle of the IPAM plugin role.
#[derive(Debug, Clone)]
pub struct CalicoIpamDriver {
    client: Arc<CalicoDatastoreClient>,
    logger: CalicoLogger,
}

impl CalicoIpamDriver {
    pub const LOCAL_ADDRESS_SPACE: &'static str = "CalicoLocalAddressSpace";
    pub const GLOBAL_ADDRESS_SPACE: &'static str = "CalicoGlobalAddressSpace";

    pub fn new(
        client: Arc<CalicoDatastoreClient>,
        logger: CalicoLogger,
    ) -> Self {
        Self { client, logger }
    }
}

impl CalicoPluginDriver for CalicoIpamDriver {
    const PLUGIN_NAME: &'static str = "calico-ipam";
    const IMPLEMENTS: &'static str = "IpamDriver";
    const METHODS: &'static [&'static str] = &[
        "GetCapabilities",
        "GetDefaultAddressSpaces",
        "RequestPool",
        "ReleasePool",
        "RequestAddress",
        "ReleaseAddress",
    ];

    fn client(&self) -> &Arc<CalicoDatastoreClient> {
        &self.client
    }

    fn logger(&self) -> &CalicoLogger {
        &self.logger
    }

    fn handle_query(&self, method: &str) -> Option<Value> {
        match method {
            "GetCapabilities" => Some(json!({ "RequiresMACAddress": false })),
            "GetDefaultAddressSpaces" => Some(json!({
                "LocalDefaultAddressSpace": Self::LOCAL_ADDRESS_SPACE,
                "GlobalDefaultAddressSpace": Self::GLOBAL_ADDRESS_SPACE,
            })),
            _ => None,
        }
    }
}

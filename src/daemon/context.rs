// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use calico_libnetwork::{
    CalicoClientConfig, CalicoDatastoreClient, CalicoError, CalicoIpamDriver,
    CalicoLogger, CalicoNetworkDriver, ErrorKind,
};

/// Everything the plugin servers share for one process run: a single
/// datastore client handed to both driver handles.
#[derive(Debug)]
pub(crate) struct CalicoStartupContext {
    client: Arc<CalicoDatastoreClient>,
    logger: CalicoLogger,
}

impl CalicoStartupContext {
    pub(crate) async fn new(
        config_source: &str,
        logger: CalicoLogger,
    ) -> Result<Self, CalicoError> {
        let config = CalicoClientConfig::load(config_source).map_err(|e| {
            e.wrap(ErrorKind::ConfigError, "Config loading error")
        })?;
        logger.debug(&format!("Datastore client config: {config}"));

        let client = CalicoDatastoreClient::new(config).await.map_err(|e| {
            e.wrap(ErrorKind::ClientError, "Client instantiation error")
        })?;
        logger.info(&format!(
            "Connected to {} datastore",
            client.datastore_type()
        ));

        Ok(Self {
            client: Arc::new(client),
            logger,
        })
    }

    pub(crate) fn logger(&self) -> CalicoLogger {
        self.logger
    }

    pub(crate) fn network_driver(&self) -> CalicoNetworkDriver {
        CalicoNetworkDriver::new(self.client.clone(), self.logger)
    }

    pub(crate) fn ipam_driver(&self) -> CalicoIpamDriver {
        CalicoIpamDriver::new(self.client.clone(), self.logger)
    }
}

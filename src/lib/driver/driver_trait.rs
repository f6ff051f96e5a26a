// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::{CalicoDatastoreClient, CalicoError, CalicoLogger, ErrorKind};

/// Per-role handler of plugin requests.
///
/// The plugin server feeds every request into [Self::handle_request] which
/// answers the activation handshake and the local capability queries, and
/// leaves everything else to [Self::handle_operation].
pub trait CalicoPluginDriver: Send + Sync + 'static {
    /// Name the plugin endpoint is published under.
    const PLUGIN_NAME: &'static str;
    /// Plugin subsystem reported on activation, also the prefix of every
    /// method this driver accepts.
    const IMPLEMENTS: &'static str;
    /// Methods of the `IMPLEMENTS` subsystem without the prefix.
    const METHODS: &'static [&'static str];

    fn client(&self) -> &Arc<CalicoDatastoreClient>;

    fn logger(&self) -> &CalicoLogger;

    /// Reply of queries which can be answered without touching datastore.
    /// Return `None` for methods needing [Self::handle_operation].
    fn handle_query(&self, method: &str) -> Option<Value>;

    /// Fulfil a plugin operation.
    /// Default implementation is return no support error.
    fn handle_operation(
        &self,
        method: &str,
        _request: Value,
    ) -> impl Future<Output = Result<Value, CalicoError>> + Send {
        let msg = format!(
            "Plugin {} has not implemented {}.{method}",
            Self::PLUGIN_NAME,
            Self::IMPLEMENTS
        );
        async move { Err(CalicoError::new(ErrorKind::NoSupport, msg)) }
    }

    fn handle_request(
        &self,
        method: &str,
        request: Value,
    ) -> impl Future<Output = Result<Value, CalicoError>> + Send {
        async move {
            self.logger()
                .debug(&format!("Plugin {} got {method}", Self::PLUGIN_NAME));
            if method == ACTIVATE_METHOD {
                return Ok(json!({ "Implements": [Self::IMPLEMENTS] }));
            }
            let op = method
                .strip_prefix(Self::IMPLEMENTS)
                .and_then(|m| m.strip_prefix('.'))
                .filter(|m| Self::METHODS.contains(m))
                .ok_or_else(|| {
                    CalicoError::new(
                        ErrorKind::InvalidArgument,
                        format!(
                            "Plugin {} does not support method {method}",
                            Self::PLUGIN_NAME
                        ),
                    )
                })?;
            match self.handle_query(op) {
                Some(reply) => Ok(reply),
                None => self.handle_operation(op, request).await,
            }
        }
    }
}

/// Handshake method every plugin must answer.
pub const ACTIVATE_METHOD: &str = "Plugin.Activate";

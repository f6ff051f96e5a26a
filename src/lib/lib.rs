// SPDX-License-Identifier: Apache-2.0

//! Building blocks of the Calico libnetwork plugin daemon: datastore client
//! configuration and construction, the network and IPAM driver handles, and
//! the plugin endpoint server.

mod config;
mod datastore;
mod driver;
mod error;
mod logging;
mod server;


pub use self::config::{CalicoClientConfig, CalicoDatastoreType};
pub use self::datastore::CalicoDatastoreClient;
pub use self::driver::{
    CalicoIpamDriver, CalicoNetworkDriver, CalicoPluginDriver, ACTIVATE_METHOD,
};
pub use self::error::{CalicoError, ErrorKind};
pub use self::logging::CalicoLogger;
pub use self::server::{
    CalicoPluginServer, DEFAULT_PLUGIN_SOCKET_DIR, PLUGIN_CONTENT_TYPE,
};

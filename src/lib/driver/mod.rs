// SPDX-License-Identifier: Apache-2.0

mod driver_trait;
mod ipam;
mod network;

pub use self::{
    driver_trait::{CalicoPluginDriver, ACTIVATE_METHOD},
    ipam::CalicoIpamDriver,
    network::CalicoNetworkDriver,
};

// SPDX-License-Identifier: Apache-2.0

mod client;
mod etcd;
mod memory;

pub use self::client::CalicoDatastoreClient;

// SPDX-License-Identifier: Apache-2.0

/// Process wide logger handle shared by the supervisor, the driver handles and
/// the plugin servers.
///
/// The actual log backend is installed once by the daemon; this handle only
/// pins the log target so every message lands in the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalicoLogger {
    target: &'static str,
}

impl Default for CalicoLogger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TARGET)
    }
}

impl CalicoLogger {
    pub const DEFAULT_TARGET: &'static str = "calico_libnetwork";

    pub fn new(target: &'static str) -> Self {
        Self { target }
    }

    pub fn debug(&self, msg: &str) {
        log::debug!(target: self.target, "{msg}");
    }

    pub fn info(&self, msg: &str) {
        log::info!(target: self.target, "{msg}");
    }

    pub fn warn(&self, msg: &str) {
        log::warn!(target: self.target, "{msg}");
    }

    pub fn error(&self, msg: &str) {
        log::error!(target: self.target, "{msg}");
    }
}

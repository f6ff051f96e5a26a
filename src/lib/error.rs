// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Please report this as bug to upstream
    Bug,
    /// Datastore client configuration could not be loaded
    ConfigError,
    /// Datastore client could not be created from the loaded configuration
    ClientError,
    /// Plugin server terminated with failure
    ServerError,
    /// Plugin server terminated without any failure
    ServerClean,
    /// Datastore request failed
    DatastoreFailure,
    /// Requested key does not exist in datastore
    NotFound,
    /// Plugin endpoint failure
    IpcFailure,
    /// Invalid argument
    InvalidArgument,
    /// Not supported
    NoSupport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::ConfigError => "config-error",
            Self::ClientError => "client-error",
            Self::ServerError => "server-error",
            Self::ServerClean => "server-clean",
            Self::DatastoreFailure => "datastore-failure",
            Self::NotFound => "not-found",
            Self::IpcFailure => "ipc-failure",
            Self::InvalidArgument => "invalid-argument",
            Self::NoSupport => "no-support",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Try not implement From for CalicoError here unless you are sure this
// error should always convert to certain type of ErrorKind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct CalicoError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl std::fmt::Display for CalicoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl CalicoError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    /// Re-tag the error as `kind` with `context` prefixed to the original
    /// message, keeping the cause readable in the final log line.
    pub fn wrap(self, kind: ErrorKind, context: &str) -> Self {
        Self {
            kind,
            msg: format!("{context}: {}", self.msg),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl std::error::Error for CalicoError {}

impl From<serde_json::Error> for CalicoError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::InvalidArgument, format!("serde_json::Error: {e}"))
    }
}

impl From<serde_yaml::Error> for CalicoError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::new(ErrorKind::ConfigError, format!("serde_yaml::Error: {e}"))
    }
}

impl From<std::io::Error> for CalicoError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Bug, format!("std::io::Error: {e}"))
    }
}

impl From<reqwest::Error> for CalicoError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(ErrorKind::DatastoreFailure, format!("reqwest::Error: {e}"))
    }
}

impl From<nix::Error> for CalicoError {
    fn from(e: nix::Error) -> Self {
        Self::new(ErrorKind::IpcFailure, format!("nix::Error: {e}"))
    }
}

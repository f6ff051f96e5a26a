// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{CalicoError, ErrorKind};

const ENV_PREFIX: &str = "CALICO_";
const PASSWORD_HIDE: &str = "<_password_hidden_>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CalicoDatastoreType {
    #[default]
    #[serde(rename = "etcdv2")]
    EtcdV2,
    /// In-process store, lost on exit. Meant for development and testing.
    #[serde(rename = "memory")]
    Memory,
}

impl CalicoDatastoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EtcdV2 => "etcdv2",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for CalicoDatastoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CalicoDatastoreType {
    type Err = CalicoError;

    fn from_str(s: &str) -> Result<Self, CalicoError> {
        match s {
            "etcdv2" => Ok(Self::EtcdV2),
            "memory" => Ok(Self::Memory),
            _ => Err(CalicoError::new(
                ErrorKind::ConfigError,
                format!(
                    "Unsupported datastore type {s}, should be etcdv2 or \
                     memory"
                ),
            )),
        }
    }
}

/// Connection settings of the backend datastore.
///
/// Loaded once at startup by [CalicoClientConfig::load] and never changed
/// afterwards.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CalicoClientConfig {
    pub datastore_type: CalicoDatastoreType,
    pub etcd_endpoints: Vec<String>,
    pub etcd_username: Option<String>,
    pub etcd_password: Option<String>,
    pub etcd_key_file: Option<String>,
    pub etcd_cert_file: Option<String>,
    pub etcd_ca_cert_file: Option<String>,
}

impl Default for CalicoClientConfig {
    fn default() -> Self {
        Self {
            datastore_type: CalicoDatastoreType::default(),
            etcd_endpoints: vec![format!(
                "{}://{}",
                Self::DEFAULT_ETCD_SCHEME,
                Self::DEFAULT_ETCD_AUTHORITY
            )],
            etcd_username: None,
            etcd_password: None,
            etcd_key_file: None,
            etcd_cert_file: None,
            etcd_ca_cert_file: None,
        }
    }
}

// Password is never printed
impl std::fmt::Debug for CalicoClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalicoClientConfig")
            .field("datastore_type", &self.datastore_type)
            .field("etcd_endpoints", &self.etcd_endpoints)
            .field("etcd_username", &self.etcd_username)
            .field(
                "etcd_password",
                &self.etcd_password.as_ref().map(|_| PASSWORD_HIDE),
            )
            .field("etcd_key_file", &self.etcd_key_file)
            .field("etcd_cert_file", &self.etcd_cert_file)
            .field("etcd_ca_cert_file", &self.etcd_ca_cert_file)
            .finish()
    }
}

impl std::fmt::Display for CalicoClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "datastore_type:{}", self.datastore_type)?;
        if self.datastore_type == CalicoDatastoreType::EtcdV2 {
            write!(f, " etcd_endpoints:{}", self.etcd_endpoints.join(","))?;
            if let Some(user) = self.etcd_username.as_ref() {
                write!(f, " etcd_username:{user}")?;
            }
            if self.etcd_password.is_some() {
                write!(f, " etcd_password:{PASSWORD_HIDE}")?;
            }
        }
        Ok(())
    }
}

impl CalicoClientConfig {
    pub const DEFAULT_ETCD_SCHEME: &'static str = "http";
    pub const DEFAULT_ETCD_AUTHORITY: &'static str = "127.0.0.1:2379";
    pub const API_VERSION: &'static str = "v1";
    pub const KIND: &'static str = "calicoApiConfig";

    /// Load configuration from `source`.
    ///
    /// Empty `source` means discovering settings from environment variables,
    /// otherwise `source` is the path of a `calicoApiConfig` YAML file and
    /// environment variables are not consulted.
    pub fn load(source: &str) -> Result<Self, CalicoError> {
        if source.is_empty() {
            Self::from_env()
        } else {
            Self::from_file(source)
        }
    }

    pub fn from_env() -> Result<Self, CalicoError> {
        Self::from_env_lookup(|name| std::env::var(name).ok())
    }

    /// Every setting is searched as `CALICO_<NAME>` first and then as
    /// `<NAME>`.
    pub fn from_env_lookup<F>(lookup: F) -> Result<Self, CalicoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(name).filter(|v| !v.is_empty()))
        };
        CalicoApiConfigSpec {
            datastore_type: get("DATASTORE_TYPE"),
            etcd_endpoints: get("ETCD_ENDPOINTS"),
            etcd_scheme: get("ETCD_SCHEME"),
            etcd_authority: get("ETCD_AUTHORITY"),
            etcd_username: get("ETCD_USERNAME"),
            etcd_password: get("ETCD_PASSWORD"),
            etcd_key_file: get("ETCD_KEY_FILE"),
            etcd_cert_file: get("ETCD_CERT_FILE"),
            etcd_ca_cert_file: get("ETCD_CA_CERT_FILE"),
        }
        .into_config()
    }

    pub fn from_file(path: &str) -> Result<Self, CalicoError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CalicoError::new(
                ErrorKind::ConfigError,
                format!("Failed to read config file {path}: {e}"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CalicoError> {
        let file: CalicoApiConfigFile = serde_yaml::from_str(content)?;
        if file.api_version != Self::API_VERSION {
            return Err(CalicoError::new(
                ErrorKind::ConfigError,
                format!(
                    "Unsupported apiVersion {}, expecting {}",
                    file.api_version,
                    Self::API_VERSION
                ),
            ));
        }
        if file.kind != Self::KIND {
            return Err(CalicoError::new(
                ErrorKind::ConfigError,
                format!(
                    "Unsupported kind {}, expecting {}",
                    file.kind,
                    Self::KIND
                ),
            ));
        }
        file.spec.unwrap_or_default().into_config()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalicoApiConfigFile {
    api_version: String,
    kind: String,
    #[serde(default)]
    spec: Option<CalicoApiConfigSpec>,
}

// Raw settings shared by the file and environment sources, validated by
// `into_config()`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalicoApiConfigSpec {
    datastore_type: Option<String>,
    etcd_endpoints: Option<String>,
    etcd_scheme: Option<String>,
    etcd_authority: Option<String>,
    etcd_username: Option<String>,
    etcd_password: Option<String>,
    etcd_key_file: Option<String>,
    etcd_cert_file: Option<String>,
    #[serde(rename = "etcdCACertFile")]
    etcd_ca_cert_file: Option<String>,
}

impl CalicoApiConfigSpec {
    fn into_config(self) -> Result<CalicoClientConfig, CalicoError> {
        let datastore_type = match non_empty(self.datastore_type) {
            Some(t) => t.parse::<CalicoDatastoreType>()?,
            None => CalicoDatastoreType::default(),
        };

        let mut etcd_endpoints: Vec<String> = non_empty(self.etcd_endpoints)
            .map(|v| {
                v.split(',')
                    .map(|e| e.trim().trim_end_matches('/').to_string())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if etcd_endpoints.is_empty() {
            etcd_endpoints.push(format!(
                "{}://{}",
                non_empty(self.etcd_scheme).as_deref().unwrap_or(
                    CalicoClientConfig::DEFAULT_ETCD_SCHEME
                ),
                non_empty(self.etcd_authority).as_deref().unwrap_or(
                    CalicoClientConfig::DEFAULT_ETCD_AUTHORITY
                ),
            ));
        }
        for endpoint in &etcd_endpoints {
            validate_endpoint(endpoint)?;
        }

        let etcd_key_file = non_empty(self.etcd_key_file);
        let etcd_cert_file = non_empty(self.etcd_cert_file);
        if etcd_key_file.is_some() != etcd_cert_file.is_some() {
            return Err(CalicoError::new(
                ErrorKind::ConfigError,
                "The etcd key file and certificate file should be both \
                 defined or both undefined"
                    .to_string(),
            ));
        }

        Ok(CalicoClientConfig {
            datastore_type,
            etcd_endpoints,
            etcd_username: non_empty(self.etcd_username),
            etcd_password: non_empty(self.etcd_password),
            etcd_key_file,
            etcd_cert_file,
            etcd_ca_cert_file: non_empty(self.etcd_ca_cert_file),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_endpoint(endpoint: &str) -> Result<(), CalicoError> {
    let url = reqwest::Url::parse(endpoint).map_err(|e| {
        CalicoError::new(
            ErrorKind::ConfigError,
            format!("Invalid etcd endpoint {endpoint}: {e}"),
        )
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CalicoError::new(
            ErrorKind::ConfigError,
            format!(
                "Invalid etcd endpoint {endpoint}: scheme should be http or \
                 https"
            ),
        ));
    }
    if url.host_str().is_none() {
        return Err(CalicoError::new(
            ErrorKind::ConfigError,
            format!("Invalid etcd endpoint {endpoint}: no host defined"),
        ));
    }
    Ok(())
}

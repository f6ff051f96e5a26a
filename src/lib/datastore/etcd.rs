// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::{CalicoClientConfig, CalicoError, ErrorKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
// etcd v2 error code for missing key
const ETCD_ERR_KEY_NOT_FOUND: u64 = 100;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    key: Option<String>,
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

impl EtcdNode {
    fn collect_leaves(self, leaves: &mut Vec<(String, String)>) {
        if self.dir {
            for node in self.nodes {
                node.collect_leaves(leaves);
            }
        } else if let (Some(key), Some(value)) = (self.key, self.value) {
            leaves.push((key, value));
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdErrorReply {
    error_code: u64,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EtcdVersionReply {
    etcdserver: String,
}

/// Client of the etcd v2 keys API.
#[derive(Debug)]
pub(crate) struct EtcdV2Backend {
    endpoints: Vec<String>,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

impl EtcdV2Backend {
    pub(crate) fn new(config: &CalicoClientConfig) -> Result<Self, CalicoError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        if let Some(ca_file) = config.etcd_ca_cert_file.as_deref() {
            let pem = read_tls_file(ca_file)?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                CalicoError::new(
                    ErrorKind::ClientError,
                    format!("Invalid etcd CA certificate {ca_file}: {e}"),
                )
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert_file), Some(key_file)) = (
            config.etcd_cert_file.as_deref(),
            config.etcd_key_file.as_deref(),
        ) {
            let mut pem = read_tls_file(cert_file)?;
            pem.push(b'\n');
            pem.extend(read_tls_file(key_file)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                CalicoError::new(
                    ErrorKind::ClientError,
                    format!(
                        "Invalid etcd client certificate {cert_file} or key \
                         {key_file}: {e}"
                    ),
                )
            })?;
            builder = builder.identity(identity);
        }

        let http = builder.build().map_err(|e| {
            CalicoError::new(
                ErrorKind::ClientError,
                format!("Failed to create etcd HTTP client: {e}"),
            )
        })?;

        Ok(Self {
            endpoints: config.etcd_endpoints.clone(),
            username: config.etcd_username.clone(),
            password: config.etcd_password.clone(),
            http,
        })
    }

    /// Query etcd server version, used to check whether the cluster is
    /// reachable.
    pub(crate) async fn version(&self) -> Result<String, CalicoError> {
        let reply = self.send(Method::GET, "/version", |r| r).await.map_err(
            |e| {
                CalicoError::new(
                    ErrorKind::ClientError,
                    format!(
                        "etcd cluster {} is not reachable: {}",
                        self.endpoints.join(","),
                        e.msg()
                    ),
                )
            },
        )?;
        if !reply.status().is_success() {
            return Err(CalicoError::new(
                ErrorKind::ClientError,
                format!(
                    "etcd cluster {} replied {} on version query",
                    self.endpoints.join(","),
                    reply.status()
                ),
            ));
        }
        Ok(reply.json::<EtcdVersionReply>().await?.etcdserver)
    }

    pub(crate) async fn get(
        &self,
        key: &str,
    ) -> Result<Option<String>, CalicoError> {
        let reply = self.send(Method::GET, &keys_path(key), |r| r).await?;
        if reply.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let node = parse_reply(key, reply).await?.node;
        if node.dir {
            Err(CalicoError::new(
                ErrorKind::InvalidArgument,
                format!("Key {key} is a directory"),
            ))
        } else {
            Ok(node.value)
        }
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), CalicoError> {
        let reply = self
            .send(Method::PUT, &keys_path(key), |r| r.form(&[("value", value)]))
            .await?;
        parse_reply(key, reply).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<(), CalicoError> {
        let reply = self.send(Method::DELETE, &keys_path(key), |r| r).await?;
        parse_reply(key, reply).await?;
        Ok(())
    }

    pub(crate) async fn list(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, CalicoError> {
        let reply = self
            .send(Method::GET, &keys_path(prefix), |r| {
                r.query(&[("recursive", "true"), ("sorted", "true")])
            })
            .await?;
        if reply.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let mut leaves = Vec::new();
        parse_reply(prefix, reply).await?.node.collect_leaves(&mut leaves);
        leaves.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Ok(leaves)
    }

    // Try each endpoint in order, only moving to the next one when the
    // request could not reach the server.
    async fn send<F>(
        &self,
        method: Method,
        path: &str,
        decorate: F,
    ) -> Result<Response, CalicoError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut errors: Vec<String> = Vec::new();
        for endpoint in &self.endpoints {
            let url = format!("{endpoint}{path}");
            let mut request = self.http.request(method.clone(), &url);
            if let Some(username) = self.username.as_deref() {
                request = request.basic_auth(username, self.password.as_deref());
            }
            match decorate(request).send().await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    log::debug!("etcd endpoint {endpoint} unavailable: {e}");
                    errors.push(format!("{endpoint}: {e}"));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CalicoError::new(
            ErrorKind::DatastoreFailure,
            format!("All etcd endpoints failed: {}", errors.join("; ")),
        ))
    }
}

fn keys_path(key: &str) -> String {
    format!("/v2/keys{key}")
}

async fn parse_reply(
    key: &str,
    reply: Response,
) -> Result<EtcdResponse, CalicoError> {
    let status = reply.status();
    if status.is_success() {
        return Ok(reply.json::<EtcdResponse>().await?);
    }
    let body = reply.text().await.unwrap_or_default();
    match serde_json::from_str::<EtcdErrorReply>(&body) {
        Ok(e) if e.error_code == ETCD_ERR_KEY_NOT_FOUND => Err(
            CalicoError::new(ErrorKind::NotFound, format!("Key {key} not found")),
        ),
        Ok(e) => Err(CalicoError::new(
            ErrorKind::DatastoreFailure,
            format!(
                "etcd error {} on {key}: {} {}",
                e.error_code,
                e.message,
                e.cause.unwrap_or_default()
            ),
        )),
        Err(_) => Err(CalicoError::new(
            ErrorKind::DatastoreFailure,
            format!("etcd replied {status} on {key}: {body}"),
        )),
    }
}

fn read_tls_file(path: &str) -> Result<Vec<u8>, CalicoError> {
    std::fs::read(path).map_err(|e| {
        CalicoError::new(
            ErrorKind::ClientError,
            format!("Failed to read etcd TLS file {path}: {e}"),
        )
    })
}

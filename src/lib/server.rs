// SPDX-License-Identifier: Apache-2.0

use std::fs::{remove_file, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

use crate::{CalicoError, CalicoPluginDriver, ErrorKind};

pub const PLUGIN_CONTENT_TYPE: &str =
    "application/vnd.docker.plugins.v1.2+json";
pub const DEFAULT_PLUGIN_SOCKET_DIR: &str = "/run/docker/plugins";

const SOCKET_MODE: u32 = 0o660;

/// Serve one driver handle on a plugin endpoint.
#[derive(Debug)]
pub struct CalicoPluginServer<D: CalicoPluginDriver> {
    driver: Arc<D>,
    socket_dir: PathBuf,
}

impl<D: CalicoPluginDriver> CalicoPluginServer<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
            socket_dir: PathBuf::from(DEFAULT_PLUGIN_SOCKET_DIR),
        }
    }

    pub fn with_socket_dir(mut self, socket_dir: &Path) -> Self {
        self.socket_dir = socket_dir.to_path_buf();
        self
    }

    pub fn socket_path(&self, endpoint_name: &str) -> PathBuf {
        self.socket_dir.join(format!("{endpoint_name}.sock"))
    }

    /// Bind `<socket_dir>/<endpoint_name>.sock` owned by group `identity` and
    /// serve plugin requests until the listener fails or `shutdown` is
    /// cancelled. Empty `identity` keeps the default group ownership.
    ///
    /// Please run this function in a dedicated task, it only returns when the
    /// server stops.
    pub async fn serve_unix(
        &self,
        identity: &str,
        endpoint_name: &str,
        shutdown: CancellationToken,
    ) -> Result<(), CalicoError> {
        let socket_path = self.socket_path(endpoint_name);
        let listener = bind_plugin_socket(&socket_path, identity)?;
        log::debug!("Listening on {}", socket_path.display());

        let app = Router::new()
            .route("/{method}", post(handle_plugin_request::<D>))
            .with_state(self.driver.clone());

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
        remove_file(&socket_path).ok();
        result.map_err(|e| {
            CalicoError::new(
                ErrorKind::ServerError,
                format!(
                    "Plugin endpoint {} failed: {e}",
                    socket_path.display()
                ),
            )
        })
    }
}

fn bind_plugin_socket(
    socket_path: &Path,
    identity: &str,
) -> Result<UnixListener, CalicoError> {
    let dir_path = match socket_path.parent() {
        Some(d) => d,
        None => {
            return Err(CalicoError::new(
                ErrorKind::IpcFailure,
                format!(
                    "Failed to find folder path of {}",
                    socket_path.display()
                ),
            ));
        }
    };

    if !dir_path.exists() {
        std::fs::create_dir_all(dir_path).map_err(|e| {
            CalicoError::new(
                ErrorKind::IpcFailure,
                format!("Failed to create dir {}: {e}", dir_path.display()),
            )
        })?;
    }

    // Stale socket left by previous run
    remove_file(socket_path).ok();

    let listener = UnixListener::bind(socket_path).map_err(|e| {
        CalicoError::new(
            ErrorKind::IpcFailure,
            format!(
                "Failed to bind UnixListener to {}: {e}",
                socket_path.display()
            ),
        )
    })?;

    if let Err(e) = set_socket_owner(socket_path, identity) {
        remove_file(socket_path).ok();
        return Err(e);
    }
    Ok(listener)
}

fn set_socket_owner(
    socket_path: &Path,
    identity: &str,
) -> Result<(), CalicoError> {
    if !identity.is_empty() {
        let group = nix::unistd::Group::from_name(identity)?.ok_or_else(|| {
            CalicoError::new(
                ErrorKind::IpcFailure,
                format!("Group {identity} not found"),
            )
        })?;
        nix::unistd::chown(socket_path, None, Some(group.gid))?;
    }
    std::fs::set_permissions(socket_path, Permissions::from_mode(SOCKET_MODE))
        .map_err(|e| {
            CalicoError::new(
                ErrorKind::IpcFailure,
                format!(
                    "Failed to set permission of {} to {SOCKET_MODE:o}: {e}",
                    socket_path.display()
                ),
            )
        })
}

async fn handle_plugin_request<D: CalicoPluginDriver>(
    State(driver): State<Arc<D>>,
    UrlPath(method): UrlPath<String>,
    body: Bytes,
) -> Response {
    let request = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(v) => v,
            Err(e) => {
                return plugin_error_reply(
                    driver.as_ref(),
                    &method,
                    CalicoError::from(e),
                );
            }
        }
    };

    match driver.handle_request(&method, request).await {
        Ok(reply) => plugin_reply(StatusCode::OK, &reply),
        Err(e) => plugin_error_reply(driver.as_ref(), &method, e),
    }
}

fn plugin_error_reply<D: CalicoPluginDriver>(
    driver: &D,
    method: &str,
    error: CalicoError,
) -> Response {
    driver.logger().warn(&format!(
        "Plugin {} failed to handle {method}: {error}",
        D::PLUGIN_NAME
    ));
    plugin_reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "Err": error.to_string() }),
    )
}

fn plugin_reply(status: StatusCode, reply: &Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)],
        reply.to_string(),
    )
        .into_response()
}

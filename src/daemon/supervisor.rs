// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use calico_libnetwork::{
    CalicoError, CalicoIpamDriver, CalicoLogger, CalicoNetworkDriver,
    CalicoPluginDriver, CalicoPluginServer, ErrorKind,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::CalicoStartupContext;

pub(crate) const NETWORK_SERVER_NAME: &str = "calico-net";
pub(crate) const IPAM_SERVER_NAME: &str = "calico-ipam";
pub(crate) const PLUGIN_IDENTITY: &str = "root";
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const MPSC_CHANNEL_SIZE: usize = 8;

type ServerResult = (&'static str, Result<(), CalicoError>);

/// Why the supervisor stopped waiting.
#[derive(Debug)]
pub(crate) enum SupervisorExit {
    /// The first server to finish, with its outcome. Finishing without error
    /// is still unexpected.
    ServerStopped {
        name: &'static str,
        result: Result<(), CalicoError>,
    },
    /// Name of the termination signal received.
    Signal(&'static str),
}

impl SupervisorExit {
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::Signal(_) => 0,
            Self::ServerStopped { .. } => 1,
        }
    }

    /// The fatal error to report, `None` on a requested shutdown.
    pub(crate) fn error(&self) -> Option<CalicoError> {
        match self {
            Self::Signal(_) => None,
            Self::ServerStopped {
                result: Err(e), ..
            } => Some(e.clone()),
            Self::ServerStopped {
                name,
                result: Ok(()),
            } => Some(CalicoError::new(
                ErrorKind::ServerClean,
                format!("{name} stopped unexpectedly"),
            )),
        }
    }

    pub(crate) fn log(&self, logger: &CalicoLogger) {
        match self {
            Self::Signal(sig) => {
                logger.info(&format!("Received {sig}, plugins stopped"))
            }
            _ => {
                if let Some(e) = self.error() {
                    logger.error(&e.to_string());
                }
            }
        }
    }
}

/// Runs plugin servers as independent tasks and reports the first of them
/// to finish.
#[derive(Debug)]
pub(crate) struct CalicoSupervisor {
    logger: CalicoLogger,
    shutdown: CancellationToken,
    result_sender: Sender<ServerResult>,
    result_receiver: Receiver<ServerResult>,
    handles: Vec<JoinHandle<()>>,
}

impl CalicoSupervisor {
    pub(crate) fn new(logger: CalicoLogger) -> Self {
        let (result_sender, result_receiver) = channel(MPSC_CHANNEL_SIZE);
        Self {
            logger,
            shutdown: CancellationToken::new(),
            result_sender,
            result_receiver,
            handles: Vec::new(),
        }
    }

    /// Spawn `server` under `name`. The server is given a token cancelled
    /// once the supervisor stops waiting.
    pub(crate) fn launch<F, Fut>(&mut self, name: &'static str, server: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), CalicoError>> + Send + 'static,
    {
        let logger = self.logger;
        let sender = self.result_sender.clone();
        let server = server(self.shutdown.clone());
        self.handles.push(tokio::spawn(async move {
            logger.info(&format!("{name} has started."));
            let result = server.await;
            logger.info(&format!("{name} has stopped working."));
            // Receiver is gone once the first result was taken
            sender.send((name, result)).await.ok();
        }));
    }

    /// Wait for the first server to finish or for `stop_signal`, then cancel
    /// every server and give them [SHUTDOWN_GRACE] to release their sockets.
    /// Results of servers finishing after the first one are discarded.
    pub(crate) async fn wait<S>(mut self, stop_signal: S) -> SupervisorExit
    where
        S: Future<Output = &'static str>,
    {
        let exit = if self.handles.is_empty() {
            SupervisorExit::ServerStopped {
                name: "supervisor",
                result: Err(CalicoError::new(
                    ErrorKind::Bug,
                    "No plugin server launched".to_string(),
                )),
            }
        } else {
            tokio::select! {
                Some((name, result)) = self.result_receiver.recv() => {
                    SupervisorExit::ServerStopped { name, result }
                }
                sig = stop_signal => SupervisorExit::Signal(sig),
            }
        };
        self.result_receiver.close();
        self.shutdown.cancel();

        let handles = std::mem::take(&mut self.handles);
        let drain = async move {
            for handle in handles {
                handle.await.ok();
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            self.logger.warn(&format!(
                "Plugin servers did not stop within {}s",
                SHUTDOWN_GRACE.as_secs()
            ));
        }
        exit
    }
}

/// Serve the network and IPAM drivers of `ctx` on their plugin endpoints
/// under `socket_dir` until one of them stops or `stop_signal` completes.
pub(crate) async fn run_plugin_servers<S>(
    ctx: &CalicoStartupContext,
    identity: &'static str,
    socket_dir: &Path,
    stop_signal: S,
) -> SupervisorExit
where
    S: Future<Output = &'static str>,
{
    let network_server = CalicoPluginServer::new(ctx.network_driver())
        .with_socket_dir(socket_dir);
    let ipam_server =
        CalicoPluginServer::new(ctx.ipam_driver()).with_socket_dir(socket_dir);

    let mut supervisor = CalicoSupervisor::new(ctx.logger());
    supervisor.launch(NETWORK_SERVER_NAME, move |shutdown| async move {
        network_server
            .serve_unix(identity, CalicoNetworkDriver::PLUGIN_NAME, shutdown)
            .await
    });
    supervisor.launch(IPAM_SERVER_NAME, move |shutdown| async move {
        ipam_server
            .serve_unix(identity, CalicoIpamDriver::PLUGIN_NAME, shutdown)
            .await
    });
    supervisor.wait(stop_signal).await
}

/// Resolve on SIGINT or SIGTERM. Never resolves if the handlers cannot be
/// installed.
pub(crate) async fn wait_terminate_signal(
    logger: CalicoLogger,
) -> &'static str {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            logger.warn(&format!("Failed to install signal handler: {e}"));
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

// SPDX-License-Identifier: Apache-2.0

mod context;
mod logger;
mod supervisor;


use std::future::Future;
use std::path::Path;

use calico_libnetwork::{CalicoLogger, DEFAULT_PLUGIN_SOCKET_DIR};

use self::context::CalicoStartupContext;
use self::logger::init_logger;
use self::supervisor::{
    run_plugin_servers, wait_terminate_signal, PLUGIN_IDENTITY,
};

const APP_NAME: &str = "libnetwork-plugin";

pub(crate) const VERSION: &str = match option_env!("CALICO_LIBNETWORK_VERSION")
{
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    // Usage errors exit with code 2 inside clap
    let matches = new_cli_command().get_matches();
    let exit_code = run(
        &matches,
        PLUGIN_IDENTITY,
        Path::new(DEFAULT_PLUGIN_SOCKET_DIR),
        wait_terminate_signal(CalicoLogger::default()),
    )
    .await;
    std::process::exit(exit_code);
}

/// Act on parsed command line and return the process exit code.
/// `stop_signal` completing shuts the plugin servers down with success.
pub(crate) async fn run<S>(
    matches: &clap::ArgMatches,
    identity: &'static str,
    socket_dir: &Path,
    stop_signal: S,
) -> i32
where
    S: Future<Output = &'static str>,
{
    if matches.get_flag("version") {
        println!("{VERSION}");
        return 0;
    }

    let config_source = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or_default();

    let logger = init_logger();

    match CalicoStartupContext::new(config_source, logger).await {
        Ok(ctx) => {
            let exit =
                run_plugin_servers(&ctx, identity, socket_dir, stop_signal)
                    .await;
            exit.log(&logger);
            exit.exit_code()
        }
        Err(e) => {
            logger.error(&e.to_string());
            1
        }
    }
}

pub(crate) fn new_cli_command() -> clap::Command {
    clap::Command::new(APP_NAME)
        .about("Calico network and IPAM plugins for Docker libnetwork")
        .arg(
            clap::Arg::new("version")
                .short('v')
                .action(clap::ArgAction::SetTrue)
                .help("Display version"),
        )
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("")
                .help(
                    "Datastore client config file, \
                     load from environment variables if empty",
                ),
        )
}

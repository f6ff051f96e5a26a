// SPDX-License-Identifier: Apache-2.0

use std::io::Write;

use calico_libnetwork::CalicoLogger;

pub(crate) fn init_logger() -> CalicoLogger {
    let mut log_builder = env_logger::Builder::new();
    log_builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            buf.timestamp(),
            record.level(),
            record.args()
        )
    });
    log_builder.target(env_logger::Target::Stdout);
    log_builder.filter(
        Some(CalicoLogger::DEFAULT_TARGET),
        log::LevelFilter::Info,
    );
    log_builder.filter(Some(env!("CARGO_CRATE_NAME")), log::LevelFilter::Info);
    // Keep the logger installed earlier in this process, if any
    log_builder.try_init().ok();
    CalicoLogger::default()
}

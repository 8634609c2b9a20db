#![warn(missing_docs)]

//! `ceph-fact`: prints one JSON document describing the state of a Ceph cluster.

use ceph_fact::cli::Cli;
use ceph_fact::logging;
use ceph_fact::policy::EXIT_FATAL;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.resolve_config();

    if let Err(e) = logging::init(&cli.log_options(config.as_ref().ok())) {
        eprintln!("ceph-fact: cannot initialise logging: {}", e);
    }
    tracing::debug!("ceph-fact {} starting", env!("CARGO_PKG_VERSION"));

    let result = match config {
        Ok(config) => cli.run(config).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

//! Field reporter daemon.
//!
//! Reads its configuration from `FIELD_REPORTER_*` environment variables
//! and runs the duty-cycle scheduler until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use field_reporter::config::ReporterConfig;
use field_reporter::daemon;
use field_reporter::tracing::init_journald_or_stdout;
use field_reporter::tracing::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    init_journald_or_stdout();

    let config = ReporterConfig::from_env().context("invalid configuration")?;

    let shutdown = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
            shutdown.cancel();
        }
    });

    daemon::run(config, shutdown).await?;
    Ok(())
}

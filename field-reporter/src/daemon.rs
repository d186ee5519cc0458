//! Daemon composition: build the concrete collaborators from the loaded
//! configuration and run the duty-cycle driver until shutdown.

use tokio_util::sync::CancellationToken;

use crate::clock::SystemClock;
use crate::config::ReporterConfig;
use crate::duty_cycle::{Collaborators, DutyCycleDriver};
use crate::error::{Error, Result};
use crate::marker::FileMarkerStore;
use crate::network::EndpointProbe;
use crate::power;
use crate::telemetry::{HttpSender, RandomGpsPayload};
use crate::tracing::prelude::*;

/// Wire up a driver for `config` using the host clock, the file marker, the
/// HTTP sender and the configured power-down mode.
pub fn build_driver(config: &ReporterConfig) -> Result<DutyCycleDriver> {
    let network = EndpointProbe::for_url(&config.api_endpoint)
        .ok_or_else(|| Error::NoEndpointHost(config.api_endpoint.clone()))?;
    let marker = FileMarkerStore::open(config.marker_path.clone());
    let sender = HttpSender::new(config.api_endpoint.as_str())?;

    Ok(DutyCycleDriver::new(
        config.device_id.clone(),
        config.duty_cycle.clone(),
        Collaborators {
            clock: Box::new(SystemClock::new(config.utc_offset)),
            network: Box::new(network),
            marker: Box::new(marker),
            payload: Box::new(RandomGpsPayload::new()),
            sender: Box::new(sender),
            power: power::controller(config.power_mode),
        },
    ))
}

/// Run the reporter until `shutdown` is cancelled.
pub async fn run(config: ReporterConfig, shutdown: CancellationToken) -> Result<()> {
    info!(
        device_id = %config.device_id,
        start_hour = config.duty_cycle.window.start_hour(),
        end_hour = config.duty_cycle.window.end_hour(),
        lead_time_min = config.duty_cycle.lead_time_minutes,
        poll_secs = config.duty_cycle.poll_interval.as_secs(),
        endpoint = %config.api_endpoint,
        marker = %config.marker_path.display(),
        power_mode = %config.power_mode,
        "Starting field reporter"
    );

    let driver = build_driver(&config)?;
    driver.run(shutdown).await;

    info!("Field reporter stopped");
    Ok(())
}

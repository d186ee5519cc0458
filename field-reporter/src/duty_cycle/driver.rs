use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::config::DutyCycleConfig;
use super::gate;
use super::planner::{self, SleepPlan};
use super::window::Zone;
use crate::clock::{self, ClockSource, LocalTimeReading};
use crate::marker::{HourMarker, MarkerStore};
use crate::network::NetworkReadiness;
use crate::power::PowerControl;
use crate::telemetry::{PayloadGenerator, TelemetryRecord, TelemetrySender};
use crate::tracing::prelude::*;

/// Pause before re-reading an unsynchronized clock.
const CLOCK_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Clock checks made at boot before the loop starts regardless.
const CLOCK_SYNC_ATTEMPTS: u32 = 10;

/// Outcome of one scheduler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run the next iteration immediately.
    Reevaluate,
    /// Carry out this plan, then run the next iteration.
    Sleep(SleepPlan),
}

/// Everything the driver talks to besides its configuration.
pub struct Collaborators {
    pub clock: Box<dyn ClockSource>,
    pub network: Box<dyn NetworkReadiness>,
    pub marker: Box<dyn MarkerStore>,
    pub payload: Box<dyn PayloadGenerator>,
    pub sender: Box<dyn TelemetrySender>,
    pub power: Box<dyn PowerControl>,
}

/// The duty-cycle control loop.
///
/// Holds no scheduling state of its own: every iteration starts from the
/// clock and the retained marker, so re-entering after a power-down is the
/// same as starting fresh.
pub struct DutyCycleDriver {
    device_id: String,
    config: DutyCycleConfig,
    clock: Box<dyn ClockSource>,
    network: Box<dyn NetworkReadiness>,
    marker: Box<dyn MarkerStore>,
    payload: Box<dyn PayloadGenerator>,
    sender: Box<dyn TelemetrySender>,
    power: Box<dyn PowerControl>,
}

impl DutyCycleDriver {
    pub fn new(
        device_id: impl Into<String>,
        config: DutyCycleConfig,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            clock,
            network,
            marker,
            payload,
            sender,
            power,
        } = collaborators;
        Self {
            device_id: device_id.into(),
            config,
            clock,
            network,
            marker,
            payload,
            sender,
            power,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Shutdown is honoured at boot, between iterations and while waiting,
    /// never in the middle of an upload.
    pub async fn run(mut self, shutdown: CancellationToken) {
        trace!("Duty-cycle driver started.");

        'boot: loop {
            tokio::select! {
                _ = shutdown.cancelled() => break 'boot,
                _ = boot(&*self.network, &*self.clock) => {}
            }

            while !shutdown.is_cancelled() {
                let plan = match self.step().await {
                    Step::Reevaluate => {
                        tokio::task::yield_now().await;
                        continue;
                    }
                    Step::Sleep(plan) => plan,
                };

                match plan {
                    SleepPlan::ShortWait(duration) => {
                        debug!(seconds = duration.as_secs(), "Short wait");
                        tokio::select! {
                            _ = shutdown.cancelled() => break 'boot,
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    SleepPlan::PowerDown(duration) => {
                        info!(seconds = duration.as_secs(), "Entering power-down");
                        let result = tokio::select! {
                            _ = shutdown.cancelled() => break 'boot,
                            result = self.power.power_down(duration) => result,
                        };
                        match result {
                            Ok(()) => {
                                info!("Back from power-down, rebooting scheduler");
                                continue 'boot;
                            }
                            Err(e) => {
                                error!(error = %e, "Power-down failed, staying awake");
                                tokio::select! {
                                    _ = shutdown.cancelled() => break 'boot,
                                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                                }
                            }
                        }
                    }
                }
            }
            break;
        }

        trace!("Duty-cycle driver stopped.");
    }

    /// Run one iteration: classify the current hour, upload if due, and
    /// return what to do before the next iteration.
    pub async fn step(&mut self) -> Step {
        let Some(now) = self.clock.now() else {
            warn!("Time not set yet, waiting");
            return Step::Sleep(SleepPlan::ShortWait(CLOCK_RETRY_INTERVAL));
        };

        match self.config.window.classify(now.hour()) {
            Zone::OutsideWindow => self.outside_window(&now),
            Zone::PreWindow => self.pre_window(&now),
            Zone::InWindow => self.in_window(&now).await,
        }
    }

    fn outside_window(&mut self, now: &LocalTimeReading) -> Step {
        info!(%now, "Outside operating window");
        self.reset_marker();

        // Already within the lead time: a power-down target would only
        // land on tomorrow, so stay up hour by hour until the window.
        let lead_secs = i64::from(self.config.lead_time_minutes) * 60;
        if planner::seconds_until_opening(now, &self.config.window) <= lead_secs {
            debug!(%now, "Within lead time of window, staying awake");
            return match SleepPlan::short_wait(planner::seconds_until_next_hour(now)) {
                Some(plan) => Step::Sleep(plan),
                None => Step::Reevaluate,
            };
        }

        let seconds = planner::seconds_until_wake(
            now,
            &self.config.window,
            self.config.lead_time_minutes,
        );
        match SleepPlan::power_down(seconds) {
            Some(plan) => Step::Sleep(plan),
            None => {
                warn!(seconds, "Computed non-positive power-down, polling instead");
                Step::Sleep(self.poll_wait())
            }
        }
    }

    fn pre_window(&mut self, now: &LocalTimeReading) -> Step {
        info!(
            %now,
            start_hour = self.config.window.start_hour(),
            "Pre-window wake-up, waiting for window to open"
        );
        self.reset_marker();

        match SleepPlan::short_wait(planner::seconds_until_next_hour(now)) {
            Some(plan) => Step::Sleep(plan),
            None => Step::Reevaluate,
        }
    }

    async fn in_window(&mut self, now: &LocalTimeReading) -> Step {
        let hour = now.hour();

        if !now.in_first_quarter_hour() {
            if let Some(plan) = SleepPlan::short_wait(planner::seconds_until_next_hour(now)) {
                debug!(%now, "Past first quarter hour, waiting for next hour");
                return Step::Sleep(plan);
            }
        }

        if gate::should_transmit(hour, self.marker.read()) {
            self.transmit(now).await;
        } else {
            debug!(hour, "Already sent data for this hour");
        }

        Step::Sleep(self.poll_wait())
    }

    async fn transmit(&mut self, now: &LocalTimeReading) {
        let hour = now.hour();
        info!(hour, "Sending telemetry");

        let Some(payload) = self.payload.generate() else {
            error!(hour, "Payload generation failed, retrying next poll");
            return;
        };

        let record = TelemetryRecord::new(&self.device_id, payload, now);
        match self.sender.send(&record).await {
            Ok(()) => {
                info!(hour, "Telemetry sent");
                match HourMarker::sent(hour) {
                    Ok(marker) => self.write_marker(marker),
                    Err(e) => error!(error = %e, "Cannot record sent hour"),
                }
            }
            Err(e) => {
                error!(hour, error = %e, "Transmission failed, retrying next poll");
            }
        }
    }

    fn reset_marker(&mut self) {
        if !self.marker.read().is_none() {
            self.write_marker(HourMarker::NONE);
        }
    }

    fn write_marker(&mut self, marker: HourMarker) {
        if let Err(e) = self.marker.write(marker) {
            error!(error = %e, %marker, "Failed to persist hour marker");
        }
    }

    fn poll_wait(&self) -> SleepPlan {
        SleepPlan::ShortWait(self.config.poll_interval)
    }
}

/// Per-boot startup: wait for the network, then for a trustworthy clock.
async fn boot(network: &dyn NetworkReadiness, clock: &dyn ClockSource) {
    network.wait_ready().await;
    clock::wait_for_sync(clock, CLOCK_SYNC_ATTEMPTS, CLOCK_RETRY_INTERVAL).await;
}

//! Power-down requests.
//!
//! A power-down discards all volatile state. Only the retained hour marker
//! and the hardware RTC come back. If a request returns at all (suspend to
//! RAM, simulation), the caller carries on as if freshly booted.

use std::time::Duration;

use async_trait::async_trait;
use strum::{Display, EnumString};
use tokio::process::Command;

use crate::tracing::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum PowerError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed {
        program: &'static str,
        status: std::process::ExitStatus,
    },
}

/// How the device powers down outside the operating window.
///
/// Every mode except `Simulate` is an `rtcwake` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PowerDownMode {
    Off,
    Mem,
    Disk,
    Standby,
    Freeze,
    Simulate,
}

#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Power down and arrange to wake after `duration`.
    async fn power_down(&self, duration: Duration) -> Result<(), PowerError>;
}

/// Build the controller for `mode`.
pub fn controller(mode: PowerDownMode) -> Box<dyn PowerControl> {
    match mode {
        PowerDownMode::Simulate => Box::new(SimulatedPowerDown),
        mode => Box::new(RtcWake::new(mode)),
    }
}

/// Programs the RTC alarm and powers down through `rtcwake(8)`.
#[derive(Debug, Clone, Copy)]
pub struct RtcWake {
    mode: PowerDownMode,
}

impl RtcWake {
    const PROGRAM: &'static str = "rtcwake";

    pub fn new(mode: PowerDownMode) -> Self {
        Self { mode }
    }

    fn args(&self, duration: Duration) -> [String; 4] {
        [
            "-m".to_owned(),
            self.mode.to_string(),
            "-s".to_owned(),
            duration.as_secs().to_string(),
        ]
    }
}

#[async_trait]
impl PowerControl for RtcWake {
    async fn power_down(&self, duration: Duration) -> Result<(), PowerError> {
        let args = self.args(duration);
        info!(mode = %self.mode, seconds = duration.as_secs(), "Requesting RTC power-down");

        let status = Command::new(Self::PROGRAM)
            .args(&args)
            .status()
            .await
            .map_err(|source| PowerError::Spawn {
                program: Self::PROGRAM,
                source,
            })?;

        if status.success() {
            // Only reached for modes that resume this process.
            info!(mode = %self.mode, "Resumed after power-down");
            Ok(())
        } else {
            Err(PowerError::Failed {
                program: Self::PROGRAM,
                status,
            })
        }
    }
}

/// Sleeps through the power-down period instead of cutting power.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedPowerDown;

#[async_trait]
impl PowerControl for SimulatedPowerDown {
    async fn power_down(&self, duration: Duration) -> Result<(), PowerError> {
        info!(seconds = duration.as_secs(), "Simulating power-down");
        tokio::time::sleep(duration).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("off", PowerDownMode::Off)]
    #[test_case("mem", PowerDownMode::Mem)]
    #[test_case("simulate", PowerDownMode::Simulate)]
    fn parses_mode_names(name: &str, expected: PowerDownMode) {
        assert_eq!(name.parse::<PowerDownMode>().unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("hibernate".parse::<PowerDownMode>().is_err());
    }

    #[test]
    fn rtcwake_arguments() {
        let args = RtcWake::new(PowerDownMode::Off).args(Duration::from_secs(37800));
        assert_eq!(args, ["-m", "off", "-s", "37800"]);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_power_down_sleeps_for_duration() {
        let start = tokio::time::Instant::now();
        SimulatedPowerDown
            .power_down(Duration::from_secs(9000))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(9000));
    }
}

use std::time::Duration;

use super::window::OperatingWindow;

#[derive(Debug, Clone)]
pub struct DutyCycleConfig {
    /// Daily hours during which one upload per hour is made.
    pub window: OperatingWindow,

    /// How long before the window opens the device wakes from power-down,
    /// to rejoin the network and resync its clock.
    pub lead_time_minutes: u32,

    /// Idle period between checks while awake in the window.
    pub poll_interval: Duration,
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self {
            window: OperatingWindow::default(),
            lead_time_minutes: 30,
            poll_interval: Duration::from_secs(60),
        }
    }
}

//! Wall-clock access.
//!
//! The scheduler only ever sees a [`LocalTimeReading`]: a calendar
//! date and time in the device's local offset. A [`ClockSource`] returns
//! `None` until its time can be trusted.

use std::time::Duration;

use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::tracing::prelude::*;

/// Readings from before this year mean the clock was never set.
pub const MIN_VALID_YEAR: i32 = 2000;

/// Minutes at or below which a reading is in the first quarter hour.
const FIRST_QUARTER_LAST_MINUTE: u8 = 15;

/// Snapshot of local calendar time, taken once per scheduler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTimeReading(PrimitiveDateTime);

impl LocalTimeReading {
    /// Wrap a local date-time, rejecting readings before [`MIN_VALID_YEAR`].
    pub fn new(datetime: PrimitiveDateTime) -> Option<Self> {
        (datetime.year() >= MIN_VALID_YEAR).then_some(Self(datetime))
    }

    pub fn datetime(&self) -> PrimitiveDateTime {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u8 {
        self.0.month().into()
    }

    pub fn day(&self) -> u8 {
        self.0.day()
    }

    pub fn hour(&self) -> u8 {
        self.0.hour()
    }

    pub fn minute(&self) -> u8 {
        self.0.minute()
    }

    pub fn second(&self) -> u8 {
        self.0.second()
    }

    pub fn in_first_quarter_hour(&self) -> bool {
        self.minute() <= FIRST_QUARTER_LAST_MINUTE
    }

    /// Date as `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.0
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_default()
    }

    /// Time as `HH:MM:SS`.
    pub fn time_string(&self) -> String {
        self.0
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for LocalTimeReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date_string(), self.time_string())
    }
}

pub trait ClockSource: Send + Sync {
    /// Current local time, or `None` while the clock is not synchronized.
    fn now(&self) -> Option<LocalTimeReading>;
}

/// Host wall clock viewed through a fixed UTC offset.
///
/// The host is expected to keep its clock disciplined (NTP, RTC); until it
/// does, the year check in [`LocalTimeReading::new`] reports the clock as
/// unsynchronized.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> Option<LocalTimeReading> {
        let local = OffsetDateTime::now_utc().to_offset(self.offset);
        LocalTimeReading::new(PrimitiveDateTime::new(local.date(), local.time()))
    }
}

/// Clock driven by the tokio timer, for simulations and tests.
///
/// Reports `start` plus the tokio time elapsed since construction. With a
/// paused runtime this makes whole days of scheduling run instantly.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    start: PrimitiveDateTime,
    origin: tokio::time::Instant,
    unsynced_for: Duration,
}

impl SimulatedClock {
    pub fn starting_at(start: PrimitiveDateTime) -> Self {
        Self {
            start,
            origin: tokio::time::Instant::now(),
            unsynced_for: Duration::ZERO,
        }
    }

    /// Report "not synchronized" for the first `period` of simulated time.
    pub fn unsynced_for(mut self, period: Duration) -> Self {
        self.unsynced_for = period;
        self
    }
}

impl ClockSource for SimulatedClock {
    fn now(&self) -> Option<LocalTimeReading> {
        let elapsed = self.origin.elapsed();
        if elapsed < self.unsynced_for {
            return None;
        }
        LocalTimeReading::new(self.start + elapsed)
    }
}

/// Wait for `clock` to report a valid time, checking up to `attempts` times.
///
/// Returns whether the clock became valid. Giving up is not fatal: the
/// scheduler keeps retrying on its own when it reads an invalid time.
pub async fn wait_for_sync(clock: &dyn ClockSource, attempts: u32, interval: Duration) -> bool {
    for attempt in 1..=attempts {
        if let Some(now) = clock.now() {
            info!(%now, "Clock synchronized");
            return true;
        }
        info!(attempt, attempts, "Waiting for system time to be set");
        tokio::time::sleep(interval).await;
    }
    error!(attempts, "Clock still not synchronized, continuing anyway");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rejects_unset_clock() {
        assert!(LocalTimeReading::new(datetime!(1970-01-01 00:00:05)).is_none());
        assert!(LocalTimeReading::new(datetime!(1999-12-31 23:59:59)).is_none());
        assert!(LocalTimeReading::new(datetime!(2000-01-01 00:00:00)).is_some());
    }

    #[test]
    fn formats_record_date_and_time() {
        let reading = LocalTimeReading::new(datetime!(2025-03-07 08:04:09)).unwrap();
        assert_eq!(reading.date_string(), "2025-03-07");
        assert_eq!(reading.time_string(), "08:04:09");
        assert_eq!(reading.to_string(), "2025-03-07 08:04:09");
    }

    #[test]
    fn first_quarter_hour_includes_minute_15() {
        let at = |minute: u8| {
            LocalTimeReading::new(datetime!(2025-03-07 10:00:00).replace_minute(minute).unwrap())
                .unwrap()
        };
        assert!(at(0).in_first_quarter_hour());
        assert!(at(15).in_first_quarter_hour());
        assert!(!at(16).in_first_quarter_hour());
        assert!(!at(59).in_first_quarter_hour());
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_clock_follows_tokio_time() {
        let clock = SimulatedClock::starting_at(datetime!(2025-03-07 23:59:00));
        tokio::time::advance(Duration::from_secs(90)).await;

        let now = clock.now().unwrap();
        assert_eq!(now.day(), 8);
        assert_eq!((now.hour(), now.minute(), now.second()), (0, 0, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_sync_returns_once_clock_is_valid() {
        let clock = SimulatedClock::starting_at(datetime!(2025-03-07 08:00:00))
            .unsynced_for(Duration::from_secs(5));

        assert!(wait_for_sync(&clock, 10, Duration::from_secs(2)).await);
        assert!(clock.now().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_sync_gives_up_after_attempts() {
        let clock = SimulatedClock::starting_at(datetime!(2025-03-07 08:00:00))
            .unsynced_for(Duration::from_secs(3600));

        assert!(!wait_for_sync(&clock, 10, Duration::from_secs(2)).await);
    }
}

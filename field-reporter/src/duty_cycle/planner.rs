//! Sleep duration arithmetic.
//!
//! Both calculations work in signed seconds so that anomalies (clock skew,
//! a window opening at midnight) surface as non-positive values. The
//! [`SleepPlan`] constructors refuse those, and the driver decides what to
//! do instead.

use std::time::Duration;

use time::Time;

use super::window::OperatingWindow;
use crate::clock::LocalTimeReading;

const SECONDS_PER_MINUTE: i64 = 60;

/// What to do between scheduler iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    /// Resumable pause; all in-memory state is kept.
    ShortWait(Duration),
    /// Destructive low-power period; only the retained marker and the RTC
    /// survive it.
    PowerDown(Duration),
}

impl SleepPlan {
    /// A short wait of `seconds`, if positive.
    pub fn short_wait(seconds: i64) -> Option<Self> {
        positive(seconds).map(Self::ShortWait)
    }

    /// A power-down of `seconds`, if positive.
    pub fn power_down(seconds: i64) -> Option<Self> {
        positive(seconds).map(Self::PowerDown)
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::ShortWait(d) | Self::PowerDown(d) => *d,
        }
    }
}

fn positive(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds)
        .ok()
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

/// Seconds left until the top of the next clock hour.
pub fn seconds_until_next_hour(now: &LocalTimeReading) -> i64 {
    (60 - i64::from(now.minute())) * SECONDS_PER_MINUTE - i64::from(now.second())
}

/// Seconds from `now` until `lead_time_minutes` before the window opens.
///
/// Today's wake-up instant is used while it is still ahead of `now`,
/// otherwise tomorrow's.
pub fn seconds_until_wake(
    now: &LocalTimeReading,
    window: &OperatingWindow,
    lead_time_minutes: u32,
) -> i64 {
    let current = now.datetime();
    let lead = time::Duration::minutes(i64::from(lead_time_minutes));

    let mut target = current.replace_time(opening_time(window)) - lead;
    if target <= current {
        target += time::Duration::DAY;
    }

    (target - current).whole_seconds()
}

/// Seconds from `now` until the window next opens, always positive.
pub fn seconds_until_opening(now: &LocalTimeReading, window: &OperatingWindow) -> i64 {
    let current = now.datetime();
    let mut opening = current.replace_time(opening_time(window));
    if opening <= current {
        opening += time::Duration::DAY;
    }
    (opening - current).whole_seconds()
}

fn opening_time(window: &OperatingWindow) -> Time {
    Time::from_hms(window.start_hour(), 0, 0).unwrap_or(Time::MIDNIGHT)
}

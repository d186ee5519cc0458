use thiserror::Error;

/// Last valid hour of the day.
pub const MAX_HOUR: u8 = 23;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("hour {0} is outside 0..=23")]
    HourOutOfRange(u8),

    #[error("window start {start} is after window end {end}")]
    Inverted { start: u8, end: u8 },
}

/// Where the current hour falls relative to the daily operating window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// The hour immediately before the window opens.
    PreWindow,
    /// Inside the window, bounds inclusive.
    InWindow,
    /// Everything else.
    OutsideWindow,
}

/// Inclusive daily hour range during which transmissions are permitted.
///
/// Construction enforces `start_hour <= end_hour <= 23`, so a window never
/// wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    start_hour: u8,
    end_hour: u8,
}

impl Default for OperatingWindow {
    /// 08:00 through 19:59.
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 19,
        }
    }
}

impl OperatingWindow {
    pub fn new(start_hour: u8, end_hour: u8) -> Result<Self, WindowError> {
        for hour in [start_hour, end_hour] {
            if hour > MAX_HOUR {
                return Err(WindowError::HourOutOfRange(hour));
            }
        }
        if start_hour > end_hour {
            return Err(WindowError::Inverted {
                start: start_hour,
                end: end_hour,
            });
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn start_hour(&self) -> u8 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u8 {
        self.end_hour
    }

    /// The pre-window hour, or `None` when the window opens at midnight.
    pub fn pre_window_hour(&self) -> Option<u8> {
        self.start_hour.checked_sub(1)
    }

    pub fn classify(&self, hour: u8) -> Zone {
        if (self.start_hour..=self.end_hour).contains(&hour) {
            Zone::InWindow
        } else if self.pre_window_hour() == Some(hour) {
            Zone::PreWindow
        } else {
            Zone::OutsideWindow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn window(start: u8, end: u8) -> OperatingWindow {
        OperatingWindow::new(start, end).unwrap()
    }

    #[test_case(7, Zone::PreWindow; "hour before start")]
    #[test_case(8, Zone::InWindow; "start is inclusive")]
    #[test_case(13, Zone::InWindow; "middle of window")]
    #[test_case(19, Zone::InWindow; "end is inclusive")]
    #[test_case(20, Zone::OutsideWindow; "hour after end")]
    #[test_case(0, Zone::OutsideWindow; "midnight")]
    #[test_case(6, Zone::OutsideWindow; "two hours before start")]
    #[test_case(23, Zone::OutsideWindow; "last hour of day")]
    fn classifies_against_day_window(hour: u8, expected: Zone) {
        assert_eq!(window(8, 19).classify(hour), expected);
    }

    #[test]
    fn zones_partition_every_valid_window() {
        for start in 0..=MAX_HOUR {
            for end in start..=MAX_HOUR {
                let w = window(start, end);
                let mut in_window = 0;
                let mut pre_window = 0;
                for hour in 0..=MAX_HOUR {
                    match w.classify(hour) {
                        Zone::InWindow => {
                            assert!(start <= hour && hour <= end);
                            in_window += 1;
                        }
                        Zone::PreWindow => {
                            assert_eq!(hour + 1, start);
                            pre_window += 1;
                        }
                        Zone::OutsideWindow => {
                            assert!(hour < start || hour > end);
                            assert_ne!(hour + 1, start);
                        }
                    }
                }
                assert_eq!(in_window, end - start + 1);
                assert_eq!(pre_window, u8::from(start > 0));
            }
        }
    }

    #[test]
    fn midnight_start_has_no_pre_window() {
        let w = window(0, 5);
        assert_eq!(w.pre_window_hour(), None);
        assert_eq!(w.classify(23), Zone::OutsideWindow);
        assert_eq!(w.classify(0), Zone::InWindow);
    }

    #[test]
    fn end_of_day_window_includes_hour_23() {
        let w = window(20, 23);
        assert_eq!(w.classify(23), Zone::InWindow);
        assert_eq!(w.classify(19), Zone::PreWindow);
    }

    #[test]
    fn rejects_inverted_window() {
        assert_eq!(
            OperatingWindow::new(19, 8),
            Err(WindowError::Inverted { start: 19, end: 8 })
        );
    }

    #[test]
    fn rejects_hours_past_23() {
        assert_eq!(
            OperatingWindow::new(8, 24),
            Err(WindowError::HourOutOfRange(24))
        );
        assert_eq!(
            OperatingWindow::new(30, 31),
            Err(WindowError::HourOutOfRange(30))
        );
    }
}

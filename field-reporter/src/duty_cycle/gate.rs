use crate::marker::HourMarker;

/// Whether `current_hour` still needs its transmission.
///
/// The marker only ever holds an hour whose upload was confirmed, so a
/// match means this hour is already serviced.
pub fn should_transmit(current_hour: u8, marker: HourMarker) -> bool {
    marker.hour() != Some(current_hour)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transmits_when_nothing_recorded() {
        for hour in 0..=23 {
            assert!(should_transmit(hour, HourMarker::NONE));
        }
    }

    #[test]
    fn holds_off_for_the_recorded_hour_only() {
        let marker = HourMarker::sent(10).unwrap();
        assert!(!should_transmit(10, marker));
        assert!(should_transmit(9, marker));
        assert!(should_transmit(11, marker));
    }

    #[test]
    fn same_inputs_give_same_answer() {
        let marker = HourMarker::sent(14).unwrap();
        for _ in 0..3 {
            assert!(!should_transmit(14, marker));
            assert!(should_transmit(15, marker));
        }
    }
}

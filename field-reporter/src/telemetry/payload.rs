//! GPS fix payload: four hex digits of longitude, four of latitude and
//! two of battery percentage, upper case, no separators.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

use thiserror::Error;

/// Encoded length of a [`GpsFix`].
pub const PAYLOAD_LEN: usize = 10;

/// Highest battery percentage produced by the generator.
const MAX_BATTERY_PERCENT: u8 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload must be exactly {PAYLOAD_LEN} characters long, got {0}")]
    Length(usize),

    #[error("invalid hex in {field}: {value:?}")]
    Hex { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsFix {
    pub longitude: u16,
    pub latitude: u16,
    pub battery: u8,
}

impl GpsFix {
    pub fn encode(&self) -> String {
        format!(
            "{:04X}{:04X}{:02X}",
            self.longitude, self.latitude, self.battery
        )
    }

    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        // ASCII-only keeps the byte slicing below on char boundaries.
        if !payload.is_ascii() || payload.len() != PAYLOAD_LEN {
            return Err(PayloadError::Length(payload.chars().count()));
        }

        fn field<T>(
            payload: &str,
            range: std::ops::Range<usize>,
            name: &'static str,
            parse: fn(&str, u32) -> Result<T, std::num::ParseIntError>,
        ) -> Result<T, PayloadError> {
            let digits = &payload[range];
            // from_str_radix accepts a leading '+', the wire format does not.
            if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(PayloadError::Hex {
                    field: name,
                    value: digits.to_owned(),
                });
            }
            parse(digits, 16).map_err(|_| PayloadError::Hex {
                field: name,
                value: digits.to_owned(),
            })
        }

        Ok(Self {
            longitude: field(payload, 0..4, "longitude", u16::from_str_radix)?,
            latitude: field(payload, 4..8, "latitude", u16::from_str_radix)?,
            battery: field(payload, 8..10, "battery", u8::from_str_radix)?,
        })
    }
}

/// Produces the payload string for one upload.
pub trait PayloadGenerator: Send {
    /// `None` when no payload could be produced this time.
    fn generate(&mut self) -> Option<String>;
}

/// Synthetic GPS fixes for devices without a receiver attached.
///
/// Randomness comes from a per-process `RandomState`, hashed with a step
/// counter.
#[derive(Debug)]
pub struct RandomGpsPayload {
    state: RandomState,
    step: u64,
}

impl RandomGpsPayload {
    pub fn new() -> Self {
        Self {
            state: RandomState::new(),
            step: 0,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut hasher = self.state.build_hasher();
        hasher.write_u64(self.step);
        self.step = self.step.wrapping_add(1);
        hasher.finish()
    }

    pub fn next_fix(&mut self) -> GpsFix {
        let bits = self.next_u64();
        GpsFix {
            longitude: bits as u16,
            latitude: (bits >> 16) as u16,
            battery: ((bits >> 32) % (u64::from(MAX_BATTERY_PERCENT) + 1)) as u8,
        }
    }
}

impl Default for RandomGpsPayload {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadGenerator for RandomGpsPayload {
    fn generate(&mut self) -> Option<String> {
        Some(self.next_fix().encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn encodes_zero_padded_upper_hex() {
        let fix = GpsFix {
            longitude: 0x00AB,
            latitude: 0xBEEF,
            battery: 100,
        };
        assert_eq!(fix.encode(), "00ABBEEF64");
    }

    #[test]
    fn parses_collector_example() {
        assert_eq!(
            GpsFix::parse("1A2B3C4D5E"),
            Ok(GpsFix {
                longitude: 0x1A2B,
                latitude: 0x3C4D,
                battery: 0x5E,
            })
        );
    }

    #[test]
    fn parse_accepts_lower_case() {
        assert_eq!(GpsFix::parse("ffff000001").unwrap().longitude, 0xFFFF);
    }

    #[test_case(""; "empty")]
    #[test_case("1A2B3C4D5"; "too short")]
    #[test_case("1A2B3C4D5E6"; "too long")]
    fn rejects_wrong_length(payload: &str) {
        assert!(matches!(
            GpsFix::parse(payload),
            Err(PayloadError::Length(_))
        ));
    }

    #[test_case("ZZZZ3C4D5E", "longitude"; "bad longitude")]
    #[test_case("1A2B3C4G5E", "latitude"; "bad latitude")]
    #[test_case("1A2B3C4D+5", "battery"; "signed battery")]
    fn rejects_non_hex(payload: &str, expected_field: &str) {
        match GpsFix::parse(payload) {
            Err(PayloadError::Hex { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn generated_payloads_parse_back_with_sane_battery() {
        let mut generator = RandomGpsPayload::new();
        for _ in 0..200 {
            let payload = generator.generate().unwrap();
            assert_eq!(payload.len(), PAYLOAD_LEN);
            let fix = GpsFix::parse(&payload).unwrap();
            assert!(fix.battery <= MAX_BATTERY_PERCENT);
        }
    }
}

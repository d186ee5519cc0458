//! Telemetry records and the collaborators that produce and upload them.

mod http;
pub mod payload;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clock::LocalTimeReading;

pub use http::HttpSender;
pub use payload::{GpsFix, PayloadError, PayloadGenerator, RandomGpsPayload};

/// One upload, as accepted by the collector API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Device identity.
    pub id: String,
    pub payload: String,
    /// `YYYY-MM-DD`, local time.
    pub date: String,
    /// `HH:MM:SS`, local time.
    pub time: String,
}

impl TelemetryRecord {
    pub fn new(device_id: &str, payload: String, taken_at: &LocalTimeReading) -> Self {
        Self {
            id: device_id.to_owned(),
            payload,
            date: taken_at.date_string(),
            time: taken_at.time_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("collector answered with status {0}")]
    Status(u16),
}

/// Uploads telemetry records.
///
/// `send` returns only once the outcome is known; any error is treated by
/// the caller as a retryable failure for the current hour.
#[async_trait]
pub trait TelemetrySender: Send + Sync {
    async fn send(&self, record: &TelemetryRecord) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn record_serializes_with_collector_field_names() {
        let now = LocalTimeReading::new(datetime!(2025-01-02 09:05:07)).unwrap();
        let record = TelemetryRecord::new("device-7", "0A0B0C0D32".into(), &now);

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "id": "device-7",
                "payload": "0A0B0C0D32",
                "date": "2025-01-02",
                "time": "09:05:07",
            })
        );
    }
}

use std::time::Duration;

use async_trait::async_trait;

use super::{SendError, TelemetryRecord, TelemetrySender};
use crate::tracing::prelude::*;

/// Per-request limit, connect included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts records as JSON to the collector endpoint.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSender {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SendError::Client)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetrySender for HttpSender {
    async fn send(&self, record: &TelemetryRecord) -> Result<(), SendError> {
        debug!(endpoint = %self.endpoint, ?record, "Posting telemetry");

        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(SendError::Transport)?;

        let status = response.status();
        info!(
            status = status.as_u16(),
            content_length = ?response.content_length(),
            "Collector responded"
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(SendError::Status(status.as_u16()))
        }
    }
}

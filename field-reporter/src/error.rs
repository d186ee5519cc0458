//! Crate-level error type used when composing the reporter.
//!
//! Individual modules keep their own error enums; this one covers what can
//! stop the daemon from starting once configuration has loaded.

use reqwest::Url;

use crate::telemetry::SendError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API endpoint {0} has no host to probe")]
    NoEndpointHost(Url),

    #[error("telemetry sender error: {0}")]
    Sender(#[from] SendError),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Network readiness.
//!
//! Joining the network is the host's business. The reporter only needs to
//! know when the collector can be reached, which it checks once per boot
//! before trusting the clock or sending anything.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::net::TcpStream;

use crate::tracing::prelude::*;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Blocks until the network is usable.
#[async_trait]
pub trait NetworkReadiness: Send + Sync {
    async fn wait_ready(&self);
}

/// For hosts where the network is up before the reporter starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

#[async_trait]
impl NetworkReadiness for AlwaysReady {
    async fn wait_ready(&self) {}
}

/// Pause before probe attempt `attempt`, counted from zero.
///
/// Devices in a deployment share the configured wake time, so after a
/// power-down they all start probing the collector in the same second.
/// The nominal pause doubles per attempt up to [`BACKOFF_MAX`], and the
/// pause actually taken lies in the upper half of it, drawn per device
/// from `seed`, so those devices drift apart instead of retrying together.
fn probe_delay(attempt: u32, seed: &RandomState) -> Duration {
    let nominal = BACKOFF_INITIAL
        .saturating_mul(1 << attempt.min(16))
        .min(BACKOFF_MAX);
    let spread = (seed.hash_one(attempt) % 1000) as f64 / 2000.0;
    nominal / 2 + nominal.mul_f64(spread)
}

/// Considers the network ready once a TCP connection to the collector
/// succeeds.
#[derive(Debug, Clone)]
pub struct EndpointProbe {
    host: String,
    port: u16,
}

impl EndpointProbe {
    /// Probe for the host and port of `url`, or `None` if it has no host.
    pub fn for_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_owned(),
            port: url.port_or_known_default()?,
        })
    }

    async fn probe(&self) -> std::io::Result<()> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(PROBE_TIMEOUT, connect).await {
            Ok(stream) => stream.map(drop),
            Err(_) => Err(std::io::ErrorKind::TimedOut.into()),
        }
    }
}

#[async_trait]
impl NetworkReadiness for EndpointProbe {
    async fn wait_ready(&self) {
        let seed = RandomState::new();
        let mut attempt = 0u32;
        loop {
            match self.probe().await {
                Ok(()) => {
                    info!(host = %self.host, port = self.port, "Collector reachable");
                    return;
                }
                Err(e) => {
                    let delay = probe_delay(attempt, &seed);
                    attempt = attempt.saturating_add(1);
                    warn!(
                        host = %self.host,
                        port = self.port,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Collector not reachable yet"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

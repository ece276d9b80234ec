//! Provider-agnostic retry decisions and full-jitter exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRIABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;

/// Retry budget and classification, passed to [`RetryPolicy`] at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retriable_statuses: Vec<u16>,
    /// Length of one backoff unit; the delay for attempt `n` is `uniform(0,1) * 2^n` units.
    pub backoff_unit_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retriable_statuses: DEFAULT_RETRIABLE_STATUSES.to_vec(),
            backoff_unit_ms: DEFAULT_BACKOFF_UNIT_MS,
        }
    }
}

/// How far one retry budget reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryScope {
    /// The attempt counter resets after every accepted chunk.
    PerChunk,
    /// One counter spans the whole transfer.
    PerOperation,
}

/// Attempt bookkeeping for one retry sequence.
#[derive(Debug, Default)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<TransportError>,
}

impl RetryState {
    pub fn record(&mut self, attempt: u32, error: TransportError) {
        self.attempt = attempt;
        self.last_error = Some(error);
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_error = None;
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Transient failures: transport I/O, timeouts, truncated bodies, stalled 308s and the
    /// configured 5xx statuses. Everything else is final.
    pub fn is_retriable(&self, error: &TransportError) -> bool {
        match error {
            TransportError::Connection(_)
            | TransportError::Timeout(_)
            | TransportError::IncompleteRead(_)
            | TransportError::NoProgress { .. } => true,
            TransportError::Status { status, .. } => {
                self.config.retriable_statuses.contains(status)
            }
            TransportError::MalformedResponse(_) | TransportError::InvalidRequest(_) => false,
        }
    }

    /// `attempt` is the 1-based count of failures in the current sequence, this one included.
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        self.is_retriable(error) && attempt <= self.config.max_retries
    }

    /// Full-jitter delay before retry `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_with_jitter(attempt, rand::random::<f64>())
    }

    /// Delay for `attempt` with an explicit jitter factor in `[0, 1)`. Uncapped.
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let unit = Duration::from_millis(self.config.backoff_unit_ms).as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = unit * jitter.clamp(0.0, 1.0) * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

//! Retry with exponential backoff

use organizer_shared::config::RetrySettings;
use organizer_shared::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::metrics::GatewayMetrics;
use super::network::NetworkState;
use crate::error::StoreError;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            factor: settings.factor,
        }
    }
}

impl RetryPolicy {
    /// `min(base * factor^attempt, max)`, no jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.saturating_pow(attempt);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}

pub struct RetryExecutor {
    policy: RetryPolicy,
    network: Arc<NetworkState>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, network: Arc<NetworkState>) -> Self {
        Self {
            policy,
            network,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails fatally, or runs out of
    /// retries. Every retryable failure marks the network disconnected
    /// right away; the first success after a failure marks it connected.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut failures: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if failures > 0 {
                        debug!(operation = label, failures, "Succeeded after retry");
                        self.network.mark_connected();
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    debug!(operation = label, "Fatal error, not retrying: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    self.network.mark_disconnected();
                    if failures >= self.policy.max_retries {
                        warn!(operation = label, attempts = failures + 1, "Retries exhausted: {}", e);
                        return Err(e);
                    }

                    let delay = self.policy.delay_for(failures);
                    failures += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_retry();
                    }
                    warn!(
                        operation = label,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable error: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

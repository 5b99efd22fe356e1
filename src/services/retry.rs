//! Retry Logic with Exponential Backoff
//!
//! Re-runs a whole transaction cycle when it failed in a way another attempt
//! can fix. What counts as retryable is decided by the error type.

use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::services::chain_errors::ChainError;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Cap on any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(retry.saturating_sub(1) as i32);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// Errors that know whether another attempt may help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ChainError {
    fn is_retryable(&self) -> bool {
        ChainError::is_retryable(self)
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// retries are used up.
///
/// `f` is invoked from scratch on every attempt, so anything it fetches
/// (fees, nonce) is fetched again.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation_name: &str, mut f: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retry = 0;

    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if retry >= config.max_retries {
            if config.max_retries > 0 {
                warn!("[Retry] {} gave up after {} attempts: {}", operation_name, retry + 1, err);
            }
            return Err(err);
        }

        retry += 1;
        let delay = config.delay_for(retry);
        debug!(
            "[Retry] {} failed ({}), retry {}/{} in {}ms",
            operation_name,
            err,
            retry,
            config.max_retries,
            delay.as_millis()
        );
        sleep(delay).await;
    }
}

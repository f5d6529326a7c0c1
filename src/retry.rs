//! # Retry With Backoff
//!
//! Full-jitter exponential backoff (delay chosen uniformly from
//! `[0, min(base * 2^attempt, max_delay))`), used by the Provider
//! Aggregator's Primary strategy when its primary child fails and a
//! fallback child must be tried.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// The delay before the `attempt`-th retry (0-indexed: `attempt = 0` is the
/// delay before the second overall try).
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let capped = config.base_delay.saturating_mul(factor).min(config.max_delay);
    if capped.is_zero() {
        return capped;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Retry `operation` up to `config.max_attempts` times, sleeping a
/// full-jitter backoff delay between attempts. Returns the last error if
/// every attempt fails.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    config.validate()?;
    let mut last_err: Option<Error> = None;
    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                log::warn!("retry attempt {} failed: {}", attempt + 1, err);
                let is_last = attempt + 1 == config.max_attempts;
                last_err = Some(err);
                if !is_last {
                    tokio::time::sleep(backoff_delay(config, attempt as u32)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::other("retry exhausted with no attempts")))
}

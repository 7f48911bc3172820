use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::transport::RemoteFailure;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: f64 = 2.5;

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Shared flag that aborts pending retries once set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Retries rate-limited calls with un-jittered exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Wait before retry `retry` (1-indexed): `base^retry` seconds.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let millis = (self.backoff_base.powi(exponent) * 1000.0).round();
        if !millis.is_finite() || millis <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    }

    pub fn run<T, F>(
        &self,
        label: &str,
        sleeper: &dyn Sleeper,
        cancel: &CancelToken,
        mut operation: F,
    ) -> Result<T, RemoteFailure>
    where
        F: FnMut() -> Result<T, RemoteFailure>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RemoteFailure::cancelled());
            }
            let failure = match operation() {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };
            if !is_rate_limited(&failure) || attempt >= max_attempts {
                return Err(failure);
            }
            let delay = self.delay_before_retry(attempt);
            warn!(
                operation = label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "rate limit hit; retrying"
            );
            sleeper.sleep(delay);
            if cancel.is_cancelled() {
                return Err(RemoteFailure::cancelled());
            }
            attempt += 1;
        }
    }
}

/// Transient throttling: the only condition eligible for retry.
pub fn is_rate_limited(failure: &RemoteFailure) -> bool {
    if failure.cancelled {
        return false;
    }
    failure.status == Some(429)
        || failure.message.contains("429")
        || failure.message.to_ascii_lowercase().contains("too many requests")
}

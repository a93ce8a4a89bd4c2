//! Retry logic with configurable backoff
//!
//! Probes and downloads both wrap a single attempt in [`download_with_retry`].
//! Only errors that classify as transient via [`IsRetryable`] are retried;
//! everything else is returned after the first attempt.
//!
//! # Example
//!
//! ```no_run
//! use segment_dl::retry::{IsRetryable, download_with_retry};
//! use segment_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::probe_default();
//! download_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{BackoffStrategy, RetryConfig};
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection reset) should return `true`.
/// Permanent failures (unexpected status, disk full) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Timeout { .. } | Error::Connection { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Status leniency is decided by the caller, see UnexpectedStatusPolicy
            Error::UnexpectedStatus { .. } => false,
            Error::Storage { .. } => false,
            Error::Config { .. } | Error::InvalidUrl { .. } => false,
            Error::Serialization(_) => false,
            Error::ExternalTool(_) | Error::NotSupported(_) => false,
            Error::NoSegments => false,
        }
    }
}

impl RetryConfig {
    /// Delay to wait before retry number `retry` (1-based), before jitter
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear => self
                .initial_delay
                .checked_mul(retry)
                .unwrap_or(self.max_delay),
            BackoffStrategy::Exponential { multiplier } => {
                let factor = multiplier.max(1.0).powi(retry as i32 - 1);
                Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
                    .unwrap_or(self.max_delay)
            }
        };
        delay.min(self.max_delay)
    }
}

/// Execute an async operation, retrying transient failures
///
/// `config.max_attempts` is the total number of calls to `operation`, so an
/// operation that always times out runs exactly that many times, sleeping
/// [`RetryConfig::delay_for_retry`] between consecutive attempts.
///
/// Returns the successful result or the last error.
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.delay_for_retry(attempt);
                let delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

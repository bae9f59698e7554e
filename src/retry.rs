//! Retry logic with exponential backoff
//!
//! The remote service rate-limits aggressively. Throttling responses (HTTP 429
//! and 503) and connect failures are retried with exponential backoff and
//! optional jitter; a `Retry-After` hint from the service is honored when it
//! asks for a longer pause than the computed backoff. Everything else is
//! returned to the caller on the first failure.
//!
//! ```no_run
//! use channel_archiver::retry::with_retry;
//! use channel_archiver::{Error, RetryConfig};
//!
//! # async fn example() -> Result<(), Error> {
//! let policy = RetryConfig::default();
//! let body = with_retry(&policy, || async {
//!     Err::<String, _>(Error::Throttled { retry_after: None })
//! })
//! .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies failures as transient or permanent
pub trait IsRetryable {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Minimum pause requested by the remote side before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Throttled { .. } => true,
            // 503 is what the CDN sends while shedding load
            Error::HttpStatus { status, .. } => *status == 503,
            // Timeouts are final
            Error::Network(e) => e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Serialization(_)
            | Error::InvalidPage { .. }
            | Error::CursorStalled { .. }
            | Error::TaskFailed(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the retry budget
/// in `config` is spent
///
/// The last error is returned once `config.max_attempts` retries have failed.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);

    loop {
        let err = match operation().await {
            Ok(value) => {
                if backoff.retries > 0 {
                    tracing::info!(retries = backoff.retries, "Recovered after backing off");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }
        let Some(wait) = backoff.next_wait(err.retry_after()) else {
            tracing::error!(error = %err, retries = backoff.retries, "Giving up");
            return Err(err);
        };

        tracing::warn!(
            error = %err,
            retry = backoff.retries,
            max_attempts = config.max_attempts,
            wait_ms = wait.as_millis(),
            "Backing off"
        );
        tokio::time::sleep(wait).await;
    }
}

/// Exponential delay schedule for one retried operation
struct Backoff<'a> {
    config: &'a RetryConfig,
    delay: Duration,
    retries: u32,
}

impl<'a> Backoff<'a> {
    fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            delay: config.initial_delay,
            retries: 0,
        }
    }

    /// Pause before the next attempt, or `None` when the budget is spent
    ///
    /// A server hint longer than the scheduled delay wins.
    fn next_wait(&mut self, hint: Option<Duration>) -> Option<Duration> {
        if self.retries >= self.config.max_attempts {
            return None;
        }
        self.retries += 1;

        let scheduled = if self.config.jitter {
            add_jitter(self.delay)
        } else {
            self.delay
        };
        let grown = self.delay.as_secs_f64() * self.config.backoff_multiplier;
        self.delay = Duration::from_secs_f64(grown).min(self.config.max_delay);

        Some(hint.map_or(scheduled, |h| scheduled.max(h)))
    }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    delay.mul_f64(factor)
}

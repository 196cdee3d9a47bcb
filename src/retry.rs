//! Bounded retries with per-attempt timeouts.
//!
//! Every external call (generation, search, embedding) goes through
//! [`call_with_policy`]: each attempt is wrapped in a timeout, transient and
//! rate-limited failures are retried with exponential backoff, and
//! everything else is returned immediately.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::debug;

use crate::error::{EmbeddingError, GatewayError, SearchError};

/// Default attempts per call, first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Default upper bound on any single retry delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Return the error.
    Fatal,
    /// Retry after the next backoff interval.
    Retry,
    /// Retry after the provider-supplied delay.
    RetryAfter(Duration),
}

/// Errors that can be classified for retrying.
pub trait Retryable: Sized {
    /// Classifies the error.
    fn disposition(&self) -> RetryDisposition;

    /// The error reported when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

fn rate_limit_disposition(retry_after: Option<Duration>) -> RetryDisposition {
    retry_after.map_or(RetryDisposition::Retry, RetryDisposition::RetryAfter)
}

impl Retryable for GatewayError {
    fn disposition(&self) -> RetryDisposition {
        match self {
            Self::Transient { .. } => RetryDisposition::Retry,
            Self::RateLimited { retry_after, .. } => rate_limit_disposition(*retry_after),
            Self::Auth { .. } | Self::InvalidRequest { .. } => RetryDisposition::Fatal,
        }
    }

    fn timed_out(after: Duration) -> Self {
        Self::Transient {
            message: format!("no response within {}s", after.as_secs_f64()),
        }
    }
}

impl Retryable for SearchError {
    fn disposition(&self) -> RetryDisposition {
        match self {
            Self::Transient { .. } => RetryDisposition::Retry,
            Self::RateLimited { retry_after, .. } => rate_limit_disposition(*retry_after),
            Self::Rejected { .. } => RetryDisposition::Fatal,
        }
    }

    fn timed_out(after: Duration) -> Self {
        Self::Transient {
            message: format!("no response within {}s", after.as_secs_f64()),
        }
    }
}

impl Retryable for EmbeddingError {
    fn disposition(&self) -> RetryDisposition {
        match self {
            Self::Transient { .. } => RetryDisposition::Retry,
            Self::RateLimited { retry_after, .. } => rate_limit_disposition(*retry_after),
            Self::InvalidInput { .. } => RetryDisposition::Fatal,
        }
    }

    fn timed_out(after: Duration) -> Self {
        Self::Transient {
            message: format!("no response within {}s", after.as_secs_f64()),
        }
    }
}

/// Retry and timeout settings for one external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, first attempt included (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, provider hints included.
    pub max_delay: Duration,
    /// Timeout applied to each attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.2)
            .with_max_elapsed_time(None)
            .build()
    }

    fn classify<E: Retryable>(&self, err: E, attempt: u32) -> backoff::Error<E> {
        if attempt >= self.max_attempts.max(1) {
            return backoff::Error::Permanent(err);
        }
        match err.disposition() {
            RetryDisposition::Fatal => backoff::Error::Permanent(err),
            RetryDisposition::Retry => backoff::Error::Transient {
                err,
                retry_after: None,
            },
            RetryDisposition::RetryAfter(delay) => backoff::Error::Transient {
                err,
                retry_after: Some(delay.min(self.max_delay)),
            },
        }
    }
}

/// Runs `operation` under `policy`.
///
/// `label` only identifies the call in logs.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-retryable error.
pub async fn call_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    let call_timeout = policy.call_timeout;

    backoff::future::retry_notify(
        policy.backoff(),
        || {
            attempt += 1;
            let current = attempt;
            let fut = operation();
            async move {
                let outcome = match tokio::time::timeout(call_timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(E::timed_out(call_timeout)),
                };
                outcome.map_err(|e| policy.classify(e, current))
            }
        },
        |err: E, delay: Duration| {
            debug!(call = label, %err, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "retrying");
        },
    )
    .await
}

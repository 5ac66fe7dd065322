//! Bounded retry with exponential backoff.
//!
//! `RetryPolicy` is the single retry abstraction of the pipeline. Endpoint
//! probing, blockhash fetches, dispatch and confirmation polling all run
//! through it with their own parameters.
//!
//! # Contract
//! - Every attempt runs under `attempt_timeout`; an elapsed deadline becomes
//!   `AttemptError::Timeout`.
//! - The classifier decides per failure: `Fatal` aborts immediately,
//!   `Transient` and `RateLimited` back off and retry.
//! - Rate-limited failures back off from a larger base.
//! - After `max_attempts` the last failure is returned inside
//!   `RetryError::Exhausted`.
//!
//! Policies are plain values; the per-call `RetryState` lives on the stack of
//! `run_with`, so concurrent calls never share anything.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::{with_timeout, TimedOut};

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retryability {
    /// Never retried.
    Fatal,
    /// Network hiccup, timeout or server-side error.
    Transient,
    /// Endpoint is throttling; back off harder.
    RateLimited,
}

impl Retryability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Retryability::Fatal => "fatal",
            Retryability::Transient => "transient",
            Retryability::RateLimited => "rate_limited",
        }
    }
}

/// Errors that know their own retry class.
pub trait Retryable {
    fn retryability(&self) -> Retryability;
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError<E> {
    /// The attempt did not finish within its deadline.
    Timeout(Duration),
    /// The operation itself returned an error.
    Failed(E),
}

impl<E> AttemptError<E> {
    /// The underlying operation error, if the attempt did not time out.
    pub fn inner(&self) -> Option<&E> {
        match self {
            AttemptError::Failed(e) => Some(e),
            AttemptError::Timeout(_) => None,
        }
    }
}

impl<E: Retryable> Retryable for AttemptError<E> {
    fn retryability(&self) -> Retryability {
        match self {
            AttemptError::Timeout(_) => Retryability::Transient,
            AttemptError::Failed(e) => e.retryability(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Timeout(d) => write!(f, "attempt timed out after {:?}", d),
            AttemptError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AttemptError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Failed(e) => Some(e),
            AttemptError::Timeout(_) => None,
        }
    }
}

/// Terminal failure of a guarded call.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The classifier marked the failure as fatal.
    Aborted(AttemptError<E>),
    /// All attempts failed with retryable errors.
    Exhausted { attempts: u32, last: AttemptError<E> },
}

impl<E> RetryError<E> {
    /// The last underlying failure.
    pub fn last(&self) -> &AttemptError<E> {
        match self {
            RetryError::Aborted(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn into_last(self) -> AttemptError<E> {
        match self {
            RetryError::Aborted(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Aborted(e) => write!(f, "non-retryable failure: {}", e),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last())
    }
}

/// Retry bookkeeping for one guarded call.
struct RetryState<E> {
    attempt: u32,
    last_error: Option<AttemptError<E>>,
    next_delay: Duration,
}

/// Bounded retry with exponential backoff and per-attempt timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
    /// Base multiplier applied to rate-limited failures.
    pub rate_limit_multiplier: u32,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            attempt_timeout,
            rate_limit_multiplier: 4,
            jitter: true,
        }
    }

    pub fn with_rate_limit_multiplier(mut self, multiplier: u32) -> Self {
        self.rate_limit_multiplier = multiplier;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `retry` (0-based) for a failure of class `class`.
    pub fn delay_for(&self, retry: u32, class: Retryability) -> Duration {
        let multiplier = match class {
            Retryability::RateLimited => self.rate_limit_multiplier,
            _ => 1,
        };
        calculate_backoff(retry, self.base_delay, self.max_delay, multiplier, self.jitter)
    }

    /// Run `op`, classifying failures with their own `Retryable` impl.
    pub async fn run<T, E, F, Fut>(&self, label: &'static str, op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with(label, op, |e: &AttemptError<E>| e.retryability()).await
    }

    /// Run `op` with a call-site specific classifier.
    pub async fn run_with<T, E, F, Fut, C>(
        &self,
        label: &'static str,
        mut op: F,
        classify: C,
    ) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&AttemptError<E>) -> Retryability,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut state = RetryState {
            attempt: 0,
            last_error: None,
            next_delay: Duration::ZERO,
        };

        loop {
            state.attempt += 1;

            let err = match with_timeout(self.attempt_timeout, op()).await {
                Ok(Ok(value)) => {
                    if let Some(previous) = &state.last_error {
                        tracing::debug!(
                            operation = label,
                            attempt = state.attempt,
                            previous_error = %previous,
                            "Succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => AttemptError::Failed(e),
                Err(TimedOut(limit)) => AttemptError::Timeout(limit),
            };

            let class = classify(&err);

            if class == Retryability::Fatal {
                tracing::debug!(operation = label, attempt = state.attempt, error = %err, "Non-retryable failure");
                return Err(RetryError::Aborted(err));
            }

            if state.attempt >= max_attempts {
                tracing::warn!(operation = label, attempts = state.attempt, error = %err, "Retries exhausted");
                metrics::record_retry_exhausted(label);
                return Err(RetryError::Exhausted {
                    attempts: state.attempt,
                    last: err,
                });
            }

            // Never shrink the delay, even when the failure class changes.
            state.next_delay = self.delay_for(state.attempt - 1, class).max(state.next_delay);

            tracing::warn!(
                operation = label,
                attempt = state.attempt,
                max_attempts = max_attempts,
                class = class.as_str(),
                delay = ?state.next_delay,
                error = %err,
                "Retrying after failure"
            );
            metrics::record_retry(label, class);
            state.last_error = Some(err);

            tokio::time::sleep(state.next_delay).await;
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
            rate_limit_multiplier: config.rate_limit_multiplier,
            jitter: config.jitter,
        }
    }
}

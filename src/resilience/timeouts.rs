//! Timeout enforcement.
//!
//! Every network-facing call in the pipeline carries a deadline. Timeouts are
//! reported as their own error type so callers can classify them separately
//! from errors returned by the remote side.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The wrapped future did not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `fut` with a deadline of `limit`.
pub async fn with_timeout<F>(limit: Duration, fut: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| TimedOut(limit))
}

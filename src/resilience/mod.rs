//! Resilience primitives.
//!
//! # Data Flow
//! ```text
//! guarded call
//!     → timeouts.rs (per-attempt deadline)
//!     → retries.rs (classify, back off, retry or give up)
//!     → backoff.rs (delay for the next attempt)
//! ```
//!
//! # Design Decisions
//! - One retry abstraction, parameterized per call site
//! - Retries sleep on the timer; nothing is spawned
//! - Classification happens once, where the error is created

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{AttemptError, RetryError, RetryPolicy, Retryability, Retryable};

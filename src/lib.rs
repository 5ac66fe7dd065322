//! Resilient submit-and-confirm pipeline for Solana staking operations.
//!
//! Takes a staking operation from intent to "confirmed or conclusively
//! failed" over flaky RPC endpoints, rate limits and network partitions.

// Chain integration
pub mod blockchain;
pub mod endpoints;

// Operations
pub mod staking;

// Cross-cutting concerns
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::PipelineConfig;
pub use lifecycle::{Pipeline, Shutdown};
pub use staking::{OperationFailure, OperationSuccess, StakingError, StakingOperationOrchestrator};

//! Staking operations.
//!
//! `orchestrator.rs` is the public entry point: one method per operation,
//! each returning `Result<OperationSuccess, OperationFailure>`. Amount checks
//! live in `validation.rs`; `events.rs` holds what is broadcast on success.

pub mod events;
pub mod orchestrator;
pub mod validation;

pub use events::StakingEvent;
pub use orchestrator::{
    OperationFailure, OperationResult, OperationSuccess, StakingError, StakingOperationOrchestrator,
};
pub use validation::{validate_amount, AmountError, AmountLimits};

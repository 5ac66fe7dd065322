//! Events published by the orchestrator.

use uuid::Uuid;

use crate::blockchain::types::OperationKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    /// An operation confirmed; balances and pool state are stale.
    RefreshRequested {
        operation_id: Uuid,
        kind: OperationKind,
        signature: String,
    },
}

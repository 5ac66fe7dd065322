//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! TransactionIntent
//!     → instructions.rs (program instructions for the intent)
//!     → wallet.rs (external signer)
//!     → transaction.rs (fresh blockhash, sign, dispatch)
//!     → confirmation.rs (poll until terminal outcome)
//! ```
//!
//! `pool.rs` decodes the pool account for read-only stats.
//!
//! `client.rs` is the only place that talks to an RPC node.
//!
//! # Security Constraints
//! - Key material never enters this crate
//! - Never log signed payloads
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod confirmation;
pub mod instructions;
pub mod pool;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{HttpConnector, HttpRpcClient, RpcClient, RpcConnector};
pub use confirmation::ConfirmationTracker;
pub use instructions::{ProtocolSdk, StakePoolProgram};
pub use pool::{PoolReadError, StakePoolState};
pub use transaction::{SubmitError, TransactionSubmitter};
pub use types::{
    Address, BlockchainError, Commitment, ConfirmationOutcome, OperationKind, RpcError,
    SubmittedTransaction, TransactionIntent,
};
pub use wallet::{SignedTransaction, UnsignedTransaction, WalletError, WalletSigner};

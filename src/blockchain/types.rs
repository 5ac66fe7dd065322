//! Chain-specific types and error definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::retries::{Retryability, Retryable};

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Commitment level of an RPC read or a confirmation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blockhash together with the last block height at which it is valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// A base58-encoded 32-byte account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self, BlockchainError> {
        match bs58::decode(value).into_vec() {
            Ok(bytes) if bytes.len() == 32 => Ok(Self(value.to_string())),
            _ => Err(BlockchainError::InvalidAddress(value.to_string())),
        }
    }

    /// For addresses known to be valid at compile time.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = BlockchainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The staking operations the pipeline can carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Initialize,
    Stake,
    Unstake,
    ClaimRewards,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Initialize => "initialize",
            OperationKind::Stake => "stake",
            OperationKind::Unstake => "unstake",
            OperationKind::ClaimRewards => "claim_rewards",
        }
    }

    /// Whether the operation moves an amount.
    pub fn carries_amount(&self) -> bool {
        matches!(self, OperationKind::Stake | OperationKind::Unstake)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user asked for. Immutable: a different amount or kind is a new intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    kind: OperationKind,
    amount_lamports: u64,
    signer: Address,
}

impl TransactionIntent {
    pub fn new(kind: OperationKind, amount_lamports: u64, signer: Address) -> Self {
        Self {
            kind,
            amount_lamports,
            signer,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn amount_lamports(&self) -> u64 {
        self.amount_lamports
    }

    pub fn signer(&self) -> &Address {
        &self.signer
    }
}

/// A transaction the network accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    pub signature: String,
    /// Blockhash the transaction was built against.
    pub blockhash: String,
    pub submitted_at_block_height: u64,
    /// Last valid block height of `blockhash`.
    pub expiry_block_height: u64,
}

/// Raw contents of an account as returned by `getAccountInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountData {
    /// Program that owns the account, base58.
    pub owner: String,
    pub lamports: u64,
    pub data: Vec<u8>,
}

/// Status of a signature as reported by `getSignatureStatuses`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Raw transaction error, present when the program or runtime rejected it.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether the transaction reached at least `target`.
    pub fn satisfies(&self, target: Commitment) -> bool {
        match self.confirmation_status {
            Some(level) => level >= target,
            // Nodes omit the level for rooted transactions.
            None => self.confirmations.is_none(),
        }
    }
}

/// Terminal result of confirmation tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    /// Landed but rejected by the program or runtime; raw error payload.
    FailedOnChain(String),
    /// Validity window passed without the transaction landing.
    Expired,
    /// Confirmation could not be established; the transaction may have landed.
    IndeterminateAfterRetries,
}

impl ConfirmationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationOutcome::Confirmed => "confirmed",
            ConfirmationOutcome::FailedOnChain(_) => "failed_on_chain",
            ConfirmationOutcome::Expired => "expired",
            ConfirmationOutcome::IndeterminateAfterRetries => "indeterminate",
        }
    }
}

/// Errors from an RPC call, classified once at the network boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The endpoint is throttling us (HTTP 429 or equivalent).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The HTTP request itself timed out.
    #[error("RPC timeout after {0:?}")]
    Timeout(Duration),

    /// No answer from the node: connect, reset or transport failure.
    #[error("transient RPC failure: {0}")]
    Transient(String),

    /// The node answered but cannot serve right now (5xx, behind, unhealthy).
    #[error("node unhealthy: {0}")]
    Unhealthy(String),

    /// The node rejected the request (preflight, signature, parameters).
    #[error("request rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The response could not be decoded.
    #[error("malformed RPC response: {0}")]
    Malformed(String),
}

impl Retryable for RpcError {
    fn retryability(&self) -> Retryability {
        match self {
            RpcError::RateLimited(_) => Retryability::RateLimited,
            RpcError::Timeout(_) | RpcError::Transient(_) | RpcError::Unhealthy(_) => Retryability::Transient,
            RpcError::Rejected { .. } | RpcError::Malformed(_) => Retryability::Fatal,
        }
    }
}

impl RpcError {
    /// Whether the node itself produced this answer, as opposed to the
    /// request never completing.
    pub fn node_answered(&self) -> bool {
        !matches!(self, RpcError::Timeout(_) | RpcError::Transient(_))
    }
}

/// Result type for RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur while preparing chain data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockchainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

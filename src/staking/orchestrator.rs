//! Staking operation orchestration.
//!
//! # Request Flow
//! ```text
//! stake / unstake / initialize_pool / claim_rewards
//!     → validate amount (no network)
//!     → connectivity check
//!     → endpoint selection (cached unless invalidated)
//!     → build, sign, dispatch
//!     → confirmation tracking
//!     → OperationSuccess | OperationFailure
//! ```
//!
//! This is the only layer that turns errors into user-facing text.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::blockchain::confirmation::ConfirmationTracker;
use crate::blockchain::pool::{fetch_pool_state, PoolReadError, StakePoolState};
use crate::blockchain::transaction::{SubmitError, TransactionSubmitter};
use crate::blockchain::types::{ConfirmationOutcome, OperationKind, RpcError, TransactionIntent};
use crate::endpoints::{EndpointSelector, HealthyEndpoint};
use crate::health::ConnectivityMonitor;
use crate::observability::metrics;
use crate::resilience::retries::AttemptError;
use crate::staking::events::StakingEvent;
use crate::staking::validation::{validate_amount, AmountError, AmountLimits};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StakingError {
    #[error("invalid amount: {0}")]
    Validation(#[from] AmountError),

    #[error("network offline")]
    Offline,

    #[error("no RPC endpoint available: {0}")]
    EndpointUnavailable(String),

    #[error("user rejected the signature request")]
    UserRejected,

    #[error("network failure: {0}")]
    TransientNetwork(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transaction failed on chain: {0}")]
    OnChainFailure(String),

    #[error("transaction expired before confirmation")]
    Expired,

    #[error("confirmation of {signature} could not be established")]
    Indeterminate { signature: String },

    #[error("{0}")]
    SignerMismatch(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StakingError {
    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StakingError::Validation(_) => "validation",
            StakingError::Offline => "offline",
            StakingError::EndpointUnavailable(_) => "endpoint_unavailable",
            StakingError::UserRejected => "user_rejected",
            StakingError::TransientNetwork(_) => "transient_network",
            StakingError::RateLimited(_) => "rate_limited",
            StakingError::OnChainFailure(_) => "on_chain_failure",
            StakingError::Expired => "expired",
            StakingError::Indeterminate { .. } => "indeterminate",
            StakingError::SignerMismatch(_) => "signer_mismatch",
            StakingError::Wallet(_) => "wallet",
            StakingError::Protocol(_) => "protocol",
        }
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            StakingError::Validation(e) => capitalize(&e.to_string()),
            StakingError::Offline => "You appear to be offline. Check your connection and try again.".to_string(),
            StakingError::EndpointUnavailable(_) => {
                "Could not reach the Solana network. Please try again shortly.".to_string()
            }
            StakingError::UserRejected => "Transaction was cancelled in your wallet.".to_string(),
            StakingError::TransientNetwork(_) => {
                "Network error while sending the transaction. Please try again.".to_string()
            }
            StakingError::RateLimited(_) => "The network is busy. Please wait a moment and try again.".to_string(),
            StakingError::OnChainFailure(reason) => format!("Transaction failed: {}", reason),
            StakingError::Expired => "Transaction expired before it was confirmed. Please try again.".to_string(),
            StakingError::Indeterminate { signature } => format!(
                "Could not confirm transaction {}. Check a block explorer before retrying.",
                signature
            ),
            StakingError::SignerMismatch(_) => {
                "The connected wallet does not match the transaction signer.".to_string()
            }
            StakingError::Wallet(reason) => format!("Wallet error: {}", reason),
            StakingError::Protocol(reason) => format!("Could not build the transaction: {}", reason),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A confirmed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSuccess {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub signature: String,
    pub amount_lamports: u64,
    pub endpoint: Url,
}

/// A failed operation, with the typed error and its user-facing text.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationFailure {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub error: StakingError,
    pub message: String,
    /// Set once the transaction was dispatched.
    pub signature: Option<String>,
}

pub type OperationResult = Result<OperationSuccess, OperationFailure>;

/// Internal failure before it is stamped with operation metadata.
struct Failed {
    error: StakingError,
    signature: Option<String>,
}

impl From<StakingError> for Failed {
    fn from(error: StakingError) -> Self {
        Self { error, signature: None }
    }
}

/// Drives staking operations from intent to a terminal result.
pub struct StakingOperationOrchestrator {
    monitor: Arc<ConnectivityMonitor>,
    selector: Arc<EndpointSelector>,
    submitter: TransactionSubmitter,
    tracker: ConfirmationTracker,
    limits: AmountLimits,
    events: broadcast::Sender<StakingEvent>,
}

impl StakingOperationOrchestrator {
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        selector: Arc<EndpointSelector>,
        submitter: TransactionSubmitter,
        tracker: ConfirmationTracker,
        limits: AmountLimits,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            monitor,
            selector,
            submitter,
            tracker,
            limits,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StakingEvent> {
        self.events.subscribe()
    }

    pub async fn initialize_pool(&self) -> OperationResult {
        self.execute(OperationKind::Initialize, Ok(0)).await
    }

    /// Stake `amount_sol` out of a wallet holding `available_lamports`.
    pub async fn stake(&self, amount_sol: f64, available_lamports: u64) -> OperationResult {
        let amount = validate_amount(amount_sol, &self.limits, available_lamports);
        self.execute(OperationKind::Stake, amount).await
    }

    /// Unstake `amount_sol` out of `staked_lamports`.
    pub async fn unstake(&self, amount_sol: f64, staked_lamports: u64) -> OperationResult {
        let amount = validate_amount(amount_sol, &self.limits, staked_lamports);
        self.execute(OperationKind::Unstake, amount).await
    }

    pub async fn claim_rewards(&self) -> OperationResult {
        self.execute(OperationKind::ClaimRewards, Ok(0)).await
    }

    /// Wallet balance in lamports, read through the selected endpoint.
    pub async fn wallet_balance(&self) -> Result<u64, StakingError> {
        let endpoint = self.read_endpoint().await?;
        let address = self.submitter.wallet().clone();
        let commitment = self.tracker.commitment();
        self.submitter
            .policy()
            .run("get_balance", || endpoint.client.get_balance(address.as_str(), commitment))
            .await
            .map_err(|e| {
                let error = self.read_failure(&endpoint, e.into_last());
                tracing::warn!(address = %address, error = %error, "Balance lookup failed");
                error
            })
    }

    /// Current pool totals, or `None` while the pool is not initialized.
    pub async fn pool_stats(&self) -> Result<Option<StakePoolState>, StakingError> {
        let endpoint = self.read_endpoint().await?;
        let sdk = self.submitter.sdk();
        let state = fetch_pool_state(
            endpoint.client.as_ref(),
            self.submitter.policy(),
            sdk.program_id(),
            sdk.pool(),
            self.tracker.commitment(),
        )
        .await;

        state.map_err(|e| match e {
            PoolReadError::Rpc(e) => {
                let error = self.read_failure(&endpoint, e.into_last());
                tracing::warn!(pool = %sdk.pool(), error = %error, "Pool lookup failed");
                error
            }
            other => {
                tracing::error!(pool = %sdk.pool(), error = %other, "Pool account unreadable");
                StakingError::Protocol(other.to_string())
            }
        })
    }

    async fn read_endpoint(&self) -> Result<Arc<HealthyEndpoint>, StakingError> {
        if !self.monitor.is_online().await {
            return Err(StakingError::Offline);
        }
        self.selector
            .select_healthy()
            .await
            .map_err(|e| StakingError::EndpointUnavailable(e.to_string()))
    }

    async fn execute(&self, kind: OperationKind, amount: Result<u64, AmountError>) -> OperationResult {
        let operation_id = Uuid::new_v4();
        let span = tracing::info_span!("staking_operation", operation_id = %operation_id, kind = %kind);

        let result = async {
            match amount {
                Ok(amount_lamports) => self.run(operation_id, kind, amount_lamports).await,
                Err(e) => {
                    tracing::info!(error = %e, "Rejected invalid amount");
                    Err(Failed::from(StakingError::from(e)))
                }
            }
        }
        .instrument(span)
        .await;

        match result {
            Ok(success) => {
                metrics::record_operation(kind.as_str(), "success");
                let _ = self.events.send(StakingEvent::RefreshRequested {
                    operation_id,
                    kind,
                    signature: success.signature.clone(),
                });
                Ok(success)
            }
            Err(failed) => {
                metrics::record_operation(kind.as_str(), failed.error.as_str());
                Err(OperationFailure {
                    operation_id,
                    kind,
                    message: failed.error.user_message(),
                    error: failed.error,
                    signature: failed.signature,
                })
            }
        }
    }

    async fn run(&self, operation_id: Uuid, kind: OperationKind, amount_lamports: u64) -> Result<OperationSuccess, Failed> {
        if !self.monitor.is_online().await {
            tracing::warn!("Operation refused while offline");
            return Err(StakingError::Offline.into());
        }

        let endpoint = self.selector.select_healthy().await.map_err(|e| {
            tracing::error!(error = %e, "No endpoint for operation");
            StakingError::EndpointUnavailable(e.to_string())
        })?;

        let intent = TransactionIntent::new(kind, amount_lamports, self.submitter.wallet().clone());
        let submitted = self
            .submitter
            .submit(&intent, endpoint.client.as_ref())
            .await
            .map_err(|e| self.submit_failure(&endpoint, e))?;

        let signature = submitted.signature.clone();
        let outcome = self.tracker.await_confirmation(&submitted, endpoint.client.as_ref()).await;
        let error = match outcome {
            ConfirmationOutcome::Confirmed => {
                tracing::info!(signature = %signature, amount_lamports, "Operation confirmed");
                return Ok(OperationSuccess {
                    operation_id,
                    kind,
                    signature,
                    amount_lamports,
                    endpoint: endpoint.url.clone(),
                });
            }
            ConfirmationOutcome::FailedOnChain(reason) => StakingError::OnChainFailure(reason),
            ConfirmationOutcome::Expired => StakingError::Expired,
            ConfirmationOutcome::IndeterminateAfterRetries => {
                self.selector.report_failure(&endpoint.url);
                StakingError::Indeterminate {
                    signature: signature.clone(),
                }
            }
        };

        Err(Failed {
            error,
            signature: Some(signature),
        })
    }

    fn submit_failure(&self, endpoint: &HealthyEndpoint, error: SubmitError) -> Failed {
        let error = match error {
            SubmitError::SignerMismatch { .. } => StakingError::SignerMismatch(error.to_string()),
            SubmitError::UserRejected => StakingError::UserRejected,
            SubmitError::Wallet(reason) => StakingError::Wallet(reason),
            SubmitError::Protocol(e) => StakingError::Protocol(e.to_string()),
            SubmitError::Prepare(e) => self.read_failure(endpoint, e.into_last()),
            SubmitError::Dispatch(e) => self.dispatch_failure(endpoint, e.into_last()),
        };
        error.into()
    }

    /// A failed read says something about the endpoint, never the transaction.
    fn read_failure(&self, endpoint: &HealthyEndpoint, error: AttemptError<RpcError>) -> StakingError {
        self.selector.report_failure(&endpoint.url);
        match error {
            AttemptError::Failed(RpcError::RateLimited(message)) => StakingError::RateLimited(message),
            AttemptError::Failed(RpcError::Rejected { message, .. }) => StakingError::EndpointUnavailable(message),
            other => StakingError::TransientNetwork(other.to_string()),
        }
    }

    /// Only a JSON-RPC rejection of `sendTransaction` is about the transaction.
    /// HTTP statuses carry a positive code.
    fn dispatch_failure(&self, endpoint: &HealthyEndpoint, error: AttemptError<RpcError>) -> StakingError {
        match error {
            AttemptError::Failed(RpcError::Rejected { code, message }) if code < 0 => {
                StakingError::OnChainFailure(message)
            }
            other => self.read_failure(endpoint, other),
        }
    }
}

impl std::fmt::Debug for StakingOperationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StakingOperationOrchestrator")
            .field("wallet", self.submitter.wallet())
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            StakingError::Validation(AmountError::BelowMinimum { min: 0.1 }).user_message(),
            "Minimum amount is 0.1 SOL"
        );
        assert_eq!(
            StakingError::UserRejected.user_message(),
            "Transaction was cancelled in your wallet."
        );
        assert!(StakingError::Indeterminate { signature: "5xyz".into() }
            .user_message()
            .contains("5xyz"));
    }

    #[test]
    fn test_metric_labels_are_distinct() {
        let errors = [
            StakingError::Offline,
            StakingError::EndpointUnavailable(String::new()),
            StakingError::UserRejected,
            StakingError::TransientNetwork(String::new()),
            StakingError::RateLimited(String::new()),
            StakingError::OnChainFailure(String::new()),
            StakingError::Expired,
            StakingError::Indeterminate { signature: String::new() },
        ];
        let labels: std::collections::HashSet<_> = errors.iter().map(|e| e.as_str()).collect();
        assert_eq!(labels.len(), errors.len());
    }
}

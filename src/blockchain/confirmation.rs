//! Confirmation tracking.
//!
//! Polls a dispatched signature until it reaches the target commitment, fails
//! on chain, or provably can no longer land because its blockhash expired.
//!
//! # Outcomes
//! - `Confirmed`: status reached the target commitment
//! - `FailedOnChain`: status carries a program or runtime error
//! - `Expired`: block height passed the blockhash's last valid height and a
//!   history search cannot find the signature
//! - `IndeterminateAfterRetries`: lookups kept failing or the overall wait ran
//!   out; the transaction may still have landed
//!
//! The tracker never resubmits.

use std::time::Duration;

use crate::blockchain::client::RpcClient;
use crate::blockchain::types::{
    Commitment, ConfirmationOutcome, RpcError, SignatureStatus, SubmittedTransaction,
};
use crate::config::ConfirmationConfig;
use crate::observability::metrics;
use crate::resilience::retries::{RetryError, RetryPolicy};
use crate::resilience::timeouts::{with_timeout, TimedOut};

/// Follows a submitted transaction to a terminal outcome.
#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    policy: RetryPolicy,
    commitment: Commitment,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ConfirmationTracker {
    pub fn new(policy: RetryPolicy, commitment: Commitment, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            policy,
            commitment,
            poll_interval,
            max_wait,
        }
    }

    pub fn from_config(config: &ConfirmationConfig) -> Self {
        Self::new(
            RetryPolicy::from(&config.retry),
            config.commitment,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.max_wait_secs),
        )
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Wait for `tx` to reach a terminal outcome.
    pub async fn await_confirmation(&self, tx: &SubmittedTransaction, rpc: &dyn RpcClient) -> ConfirmationOutcome {
        let outcome = match with_timeout(self.max_wait, self.track(tx, rpc)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(
                    signature = %tx.signature,
                    endpoint = %rpc.url(),
                    error = %e,
                    "Confirmation lookups failed"
                );
                ConfirmationOutcome::IndeterminateAfterRetries
            }
            Err(TimedOut(limit)) => {
                tracing::warn!(signature = %tx.signature, waited = ?limit, "Confirmation wait ran out");
                ConfirmationOutcome::IndeterminateAfterRetries
            }
        };

        match &outcome {
            ConfirmationOutcome::Confirmed => {
                tracing::info!(signature = %tx.signature, commitment = %self.commitment, "Transaction confirmed");
            }
            ConfirmationOutcome::FailedOnChain(reason) => {
                tracing::warn!(signature = %tx.signature, reason = %reason, "Transaction failed on chain");
            }
            ConfirmationOutcome::Expired => {
                tracing::warn!(
                    signature = %tx.signature,
                    expiry_block_height = tx.expiry_block_height,
                    "Transaction expired without landing"
                );
            }
            ConfirmationOutcome::IndeterminateAfterRetries => {}
        }
        metrics::record_confirmation_outcome(outcome.as_str());
        outcome
    }

    async fn track(
        &self,
        tx: &SubmittedTransaction,
        rpc: &dyn RpcClient,
    ) -> Result<ConfirmationOutcome, RetryError<RpcError>> {
        let signature = tx.signature.as_str();
        let commitment = self.commitment;
        let mut polls: u32 = 0;

        loop {
            polls += 1;

            let status = self
                .policy
                .run("get_signature_status", || rpc.get_signature_status(signature, false))
                .await?;
            if let Some(outcome) = status.as_ref().and_then(|s| judge(s, commitment)) {
                return Ok(outcome);
            }

            let height = self
                .policy
                .run("get_block_height", || rpc.get_block_height(commitment))
                .await?;

            if height > tx.expiry_block_height {
                // Last chance: the recent status cache may have missed it.
                let landed = self
                    .policy
                    .run("get_signature_status", || rpc.get_signature_status(signature, true))
                    .await?;
                match landed {
                    None => return Ok(ConfirmationOutcome::Expired),
                    Some(status) => {
                        if let Some(outcome) = judge(&status, commitment) {
                            return Ok(outcome);
                        }
                        tracing::debug!(
                            signature,
                            slot = status.slot,
                            "Landed past expiry below target commitment, still waiting"
                        );
                    }
                }
            }

            tracing::trace!(signature, polls, block_height = height, "Not yet confirmed");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn judge(status: &SignatureStatus, commitment: Commitment) -> Option<ConfirmationOutcome> {
    if let Some(err) = &status.err {
        return Some(ConfirmationOutcome::FailedOnChain(err.to_string()));
    }
    if status.satisfies(commitment) {
        return Some(ConfirmationOutcome::Confirmed);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(err: Option<serde_json::Value>, level: Option<Commitment>, confirmations: Option<u64>) -> SignatureStatus {
        SignatureStatus {
            slot: 10,
            confirmations,
            err,
            confirmation_status: level,
        }
    }

    #[test]
    fn test_error_wins_over_commitment() {
        let s = status(Some(json!({"InstructionError": [1, {"Custom": 6001}]})), Some(Commitment::Finalized), None);
        assert_eq!(
            judge(&s, Commitment::Confirmed),
            Some(ConfirmationOutcome::FailedOnChain(r#"{"InstructionError":[1,{"Custom":6001}]}"#.to_string()))
        );
    }

    #[test]
    fn test_below_target_is_pending() {
        let s = status(None, Some(Commitment::Processed), Some(0));
        assert_eq!(judge(&s, Commitment::Confirmed), None);
        assert_eq!(judge(&s, Commitment::Processed), Some(ConfirmationOutcome::Confirmed));
    }

    #[test]
    fn test_rooted_without_level_counts_as_finalized() {
        let s = status(None, None, None);
        assert_eq!(judge(&s, Commitment::Finalized), Some(ConfirmationOutcome::Confirmed));
    }
}

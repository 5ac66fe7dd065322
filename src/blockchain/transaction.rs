//! Transaction building, signing and dispatch.
//!
//! # Responsibilities
//! - Build a transaction against a fresh blockhash on every call
//! - Hand it to the wallet for signing
//! - Dispatch it under the submission retry policy
//!
//! A `SubmittedTransaction` only means the node accepted the bytes. Whether
//! the transaction lands is for `ConfirmationTracker` to find out.

use std::sync::Arc;

use thiserror::Error;

use crate::blockchain::client::RpcClient;
use crate::blockchain::instructions::{ProtocolError, ProtocolSdk};
use crate::blockchain::types::{Address, Commitment, RpcError, SubmittedTransaction, TransactionIntent};
use crate::blockchain::wallet::{UnsignedTransaction, WalletError, WalletSigner};
use crate::resilience::retries::{RetryError, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("intent signer {intent} does not match wallet {wallet}")]
    SignerMismatch { intent: Address, wallet: Address },

    #[error("signature request rejected by user")]
    UserRejected,

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("instruction building failed: {0}")]
    Protocol(#[from] ProtocolError),

    /// Reading chain state before signing failed; nothing was sent.
    #[error("preparing transaction failed: {0}")]
    Prepare(RetryError<RpcError>),

    /// The signed transaction could not be dispatched.
    #[error("dispatch failed: {0}")]
    Dispatch(RetryError<RpcError>),
}

/// Builds, signs and dispatches transactions for intents.
pub struct TransactionSubmitter {
    wallet: Arc<dyn WalletSigner>,
    sdk: Arc<dyn ProtocolSdk>,
    policy: RetryPolicy,
    commitment: Commitment,
}

impl TransactionSubmitter {
    pub fn new(wallet: Arc<dyn WalletSigner>, sdk: Arc<dyn ProtocolSdk>, policy: RetryPolicy) -> Self {
        Self {
            wallet,
            sdk,
            policy,
            commitment: Commitment::Confirmed,
        }
    }

    /// Commitment used for blockhash and block height reads.
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn wallet(&self) -> &Address {
        self.wallet.public_key()
    }

    pub fn sdk(&self) -> &dyn ProtocolSdk {
        self.sdk.as_ref()
    }

    /// Policy guarding every RPC call the submitter makes.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    /// Build, sign and dispatch `intent` through `rpc`.
    pub async fn submit(
        &self,
        intent: &TransactionIntent,
        rpc: &dyn RpcClient,
    ) -> Result<SubmittedTransaction, SubmitError> {
        let wallet = self.wallet.public_key();
        if intent.signer() != wallet {
            return Err(SubmitError::SignerMismatch {
                intent: intent.signer().clone(),
                wallet: wallet.clone(),
            });
        }

        let commitment = self.commitment;
        let blockhash = self
            .policy
            .run("get_latest_blockhash", || rpc.get_latest_blockhash(commitment))
            .await
            .map_err(SubmitError::Prepare)?;
        let submitted_at = self
            .policy
            .run("get_block_height", || rpc.get_block_height(commitment))
            .await
            .map_err(SubmitError::Prepare)?;

        let instructions = self.sdk.instructions_for(intent)?;
        let unsigned = UnsignedTransaction {
            fee_payer: wallet.clone(),
            recent_blockhash: blockhash.blockhash.clone(),
            instructions,
        };

        let signed = match self.wallet.sign_transaction(unsigned).await {
            Ok(signed) => signed,
            Err(WalletError::UserRejected) => {
                tracing::info!(kind = %intent.kind(), "User declined to sign");
                return Err(SubmitError::UserRejected);
            }
            Err(WalletError::Unavailable(reason)) => {
                tracing::warn!(kind = %intent.kind(), reason = %reason, "Wallet could not sign");
                return Err(SubmitError::Wallet(reason));
            }
        };

        let returned = self
            .policy
            .run("send_transaction", || rpc.send_transaction(&signed))
            .await
            .map_err(|e| {
                tracing::warn!(
                    endpoint = %rpc.url(),
                    signature = %signed.signature,
                    error = %e,
                    "Dispatch failed"
                );
                SubmitError::Dispatch(e)
            })?;

        // The wallet's signature is the transaction id; the node only echoes it.
        let signature = signed.signature;
        if returned != signature {
            tracing::warn!(
                tracked = %signature,
                returned = %returned,
                "Node returned an unexpected signature, tracking the signed one"
            );
        }

        tracing::info!(
            kind = %intent.kind(),
            signature = %signature,
            endpoint = %rpc.url(),
            expiry_block_height = blockhash.last_valid_block_height,
            "Transaction dispatched"
        );

        Ok(SubmittedTransaction {
            signature,
            blockhash: blockhash.blockhash,
            submitted_at_block_height: submitted_at,
            expiry_block_height: blockhash.last_valid_block_height,
        })
    }
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("wallet", self.wallet.public_key())
            .field("policy", &self.policy)
            .field("commitment", &self.commitment)
            .finish()
    }
}

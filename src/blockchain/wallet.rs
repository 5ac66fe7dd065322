//! Wallet collaborator.
//!
//! Signing happens outside this crate (browser wallet, hardware signer). The
//! pipeline only hands over an unsigned transaction and waits for either the
//! signed bytes or a rejection.
//!
//! # Security
//! - Key material never passes through this crate
//! - Signed payloads are never logged

use async_trait::async_trait;
use thiserror::Error;

use crate::blockchain::instructions::Instruction;
use crate::blockchain::types::Address;

/// A transaction waiting for the wallet's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub fee_payer: Address,
    pub recent_blockhash: String,
    pub instructions: Vec<Instruction>,
}

/// A signed transaction ready for dispatch.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// First signature, base58; also the transaction ID.
    pub signature: String,
    /// Serialized wire format.
    pub wire_bytes: Vec<u8>,
}

impl std::fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("signature", &self.signature)
            .field("len", &self.wire_bytes.len())
            .finish()
    }
}

/// Errors reported by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user declined to sign.
    #[error("signature request rejected by user")]
    UserRejected,

    /// The wallet could not sign (locked, disconnected, unsupported).
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// The signing surface of a connected wallet.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn public_key(&self) -> &Address;

    async fn sign_transaction(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, WalletError>;
}

//! Instruction building for the stake-pool program.
//!
//! Instruction data is a one-byte tag followed by fixed-width little-endian
//! fields, matching the Borsh layout the program deserializes:
//!
//! ```text
//! Initialize    [0]
//! Stake         [1, amount: u64 LE]
//! Unstake       [2, amount: u64 LE]
//! ClaimRewards  [3]
//! ```
//!
//! A stake additionally moves the lamports with a system-program transfer
//! (`[2, 0, 0, 0, lamports: u64 LE]`) ahead of the pool instruction.

use thiserror::Error;

use crate::blockchain::types::{Address, BlockchainError, OperationKind, TransactionIntent};
use crate::config::StakingConfig;

/// The system program.
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// System program instruction index for `Transfer`.
const SYSTEM_TRANSFER_INDEX: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }

    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{0} requires a non-zero amount")]
    ZeroAmount(OperationKind),
}

/// Supplies the instructions for an intent.
pub trait ProtocolSdk: Send + Sync {
    fn instructions_for(&self, intent: &TransactionIntent) -> Result<Vec<Instruction>, ProtocolError>;

    fn program_id(&self) -> &Address;

    /// The pool state account.
    fn pool(&self) -> &Address;
}

/// Stake-pool program instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolInstruction {
    Initialize,
    Stake { amount: u64 },
    Unstake { amount: u64 },
    ClaimRewards,
}

impl PoolInstruction {
    pub fn tag(&self) -> u8 {
        match self {
            PoolInstruction::Initialize => 0,
            PoolInstruction::Stake { .. } => 1,
            PoolInstruction::Unstake { .. } => 2,
            PoolInstruction::ClaimRewards => 3,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![self.tag()];
        match self {
            PoolInstruction::Stake { amount } | PoolInstruction::Unstake { amount } => {
                data.extend_from_slice(&amount.to_le_bytes());
            }
            PoolInstruction::Initialize | PoolInstruction::ClaimRewards => {}
        }
        data
    }
}

/// Data for a system-program lamport transfer.
pub fn encode_system_transfer(lamports: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data
}

/// `ProtocolSdk` for the stake-pool program.
#[derive(Debug, Clone)]
pub struct StakePoolProgram {
    program_id: Address,
    pool: Address,
    system_program: Address,
}

impl StakePoolProgram {
    pub fn new(program_id: Address, pool: Address) -> Self {
        Self {
            program_id,
            pool,
            system_program: Address::new_unchecked(SYSTEM_PROGRAM_ID),
        }
    }

    pub fn from_config(config: &StakingConfig) -> Result<Self, BlockchainError> {
        Ok(Self::new(
            Address::parse(&config.program_id)?,
            Address::parse(&config.pool_address)?,
        ))
    }

    fn pool_instruction(&self, signer: &Address, ix: PoolInstruction) -> Instruction {
        let mut accounts = vec![
            AccountMeta::writable(self.pool.clone(), false),
            AccountMeta::writable(signer.clone(), true),
        ];
        if ix == PoolInstruction::Initialize {
            accounts.push(AccountMeta::readonly(self.system_program.clone(), false));
        }
        Instruction {
            program_id: self.program_id.clone(),
            accounts,
            data: ix.encode(),
        }
    }
}

impl ProtocolSdk for StakePoolProgram {
    fn instructions_for(&self, intent: &TransactionIntent) -> Result<Vec<Instruction>, ProtocolError> {
        let signer = intent.signer();
        let amount = intent.amount_lamports();
        if intent.kind().carries_amount() && amount == 0 {
            return Err(ProtocolError::ZeroAmount(intent.kind()));
        }

        let instructions = match intent.kind() {
            OperationKind::Initialize => vec![self.pool_instruction(signer, PoolInstruction::Initialize)],
            OperationKind::Stake => vec![
                Instruction {
                    program_id: self.system_program.clone(),
                    accounts: vec![
                        AccountMeta::writable(signer.clone(), true),
                        AccountMeta::writable(self.pool.clone(), false),
                    ],
                    data: encode_system_transfer(amount),
                },
                self.pool_instruction(signer, PoolInstruction::Stake { amount }),
            ],
            OperationKind::Unstake => vec![self.pool_instruction(signer, PoolInstruction::Unstake { amount })],
            OperationKind::ClaimRewards => vec![self.pool_instruction(signer, PoolInstruction::ClaimRewards)],
        };
        Ok(instructions)
    }

    fn program_id(&self) -> &Address {
        &self.program_id
    }

    fn pool(&self) -> &Address {
        &self.pool
    }
}

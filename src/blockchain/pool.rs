//! Stake pool account state.
//!
//! The program stores its pool as a Borsh struct with no discriminator:
//!
//! ```text
//! total_staked      u64 LE   bytes 0..8
//! reward_rate       u64 LE   bytes 8..16   (annual %, as stored)
//! last_update_time  i64 LE   bytes 16..24  (unix seconds)
//! ```
//!
//! Trailing bytes are ignored; accounts may be allocated larger than the struct.

use serde::Serialize;
use thiserror::Error;

use crate::blockchain::client::RpcClient;
use crate::blockchain::types::{Address, Commitment, RpcError};
use crate::resilience::retries::{RetryError, RetryPolicy};

/// Serialized size of the pool struct.
pub const POOL_STATE_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StakePoolState {
    pub total_staked: u64,
    pub reward_rate: u64,
    pub last_update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolStateError {
    #[error("pool account holds {len} bytes, expected at least {POOL_STATE_LEN}")]
    TooShort { len: usize },
}

impl StakePoolState {
    pub fn decode(data: &[u8]) -> Result<Self, PoolStateError> {
        if data.len() < POOL_STATE_LEN {
            return Err(PoolStateError::TooShort { len: data.len() });
        }
        Ok(Self {
            total_staked: u64::from_le_bytes(le_bytes(data, 0)),
            reward_rate: u64::from_le_bytes(le_bytes(data, 8)),
            last_update_time: i64::from_le_bytes(le_bytes(data, 16)),
        })
    }
}

fn le_bytes(data: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&data[offset..offset + 8]);
    out
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolReadError {
    #[error("reading pool account failed: {0}")]
    Rpc(#[from] RetryError<RpcError>),

    #[error("pool account {pool} is owned by {owner}, not {program}")]
    WrongOwner { pool: Address, owner: String, program: Address },

    #[error(transparent)]
    Decode(#[from] PoolStateError),
}

/// Read and decode the pool account. `Ok(None)` means the pool is not initialized.
pub async fn fetch_pool_state(
    rpc: &dyn RpcClient,
    policy: &RetryPolicy,
    program_id: &Address,
    pool: &Address,
    commitment: Commitment,
) -> Result<Option<StakePoolState>, PoolReadError> {
    let account = policy
        .run("get_account_info", || rpc.get_account_info(pool.as_str(), commitment))
        .await?;
    let Some(account) = account else {
        tracing::debug!(pool = %pool, "Pool account not found");
        return Ok(None);
    };
    if account.owner != program_id.as_str() {
        return Err(PoolReadError::WrongOwner {
            pool: pool.clone(),
            owner: account.owner,
            program: program_id.clone(),
        });
    }
    Ok(Some(StakePoolState::decode(&account.data)?))
}

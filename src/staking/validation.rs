//! Amount validation.
//!
//! Runs before anything touches the network. Amounts arrive as user-entered
//! SOL and leave as lamports.

use thiserror::Error;

use crate::blockchain::types::LAMPORTS_PER_SOL;
use crate::config::StakingConfig;

/// Protocol bounds on a single stake or unstake, in SOL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountLimits {
    pub min_sol: f64,
    pub max_sol: f64,
}

impl Default for AmountLimits {
    fn default() -> Self {
        Self {
            min_sol: 0.1,
            max_sol: 1000.0,
        }
    }
}

impl From<&StakingConfig> for AmountLimits {
    fn from(config: &StakingConfig) -> Self {
        Self {
            min_sol: config.min_amount_sol,
            max_sol: config.max_amount_sol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmountError {
    #[error("amount must be a number")]
    NotFinite,

    #[error("amount must be greater than zero")]
    NotPositive,

    #[error("minimum amount is {min} SOL")]
    BelowMinimum { min: f64 },

    #[error("maximum amount is {max} SOL")]
    AboveMaximum { max: f64 },

    #[error("insufficient balance: requested {} SOL, available {} SOL", sol(.requested), sol(.available))]
    InsufficientBalance { requested: u64, available: u64 },
}

pub fn sol_to_lamports(amount_sol: f64) -> u64 {
    (amount_sol * LAMPORTS_PER_SOL as f64).round() as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

fn sol(lamports: &u64) -> f64 {
    lamports_to_sol(*lamports)
}

/// Check `amount_sol` against the protocol bounds and `available_lamports`.
/// Returns the amount in lamports.
pub fn validate_amount(amount_sol: f64, limits: &AmountLimits, available_lamports: u64) -> Result<u64, AmountError> {
    if !amount_sol.is_finite() {
        return Err(AmountError::NotFinite);
    }
    if amount_sol <= 0.0 {
        return Err(AmountError::NotPositive);
    }
    if amount_sol < limits.min_sol {
        return Err(AmountError::BelowMinimum { min: limits.min_sol });
    }
    if amount_sol > limits.max_sol {
        return Err(AmountError::AboveMaximum { max: limits.max_sol });
    }

    let requested = sol_to_lamports(amount_sol);
    if requested > available_lamports {
        return Err(AmountError::InsufficientBalance {
            requested,
            available: available_lamports,
        });
    }
    Ok(requested)
}

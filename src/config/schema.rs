//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::blockchain::types::Commitment;

/// Root configuration for the staking transaction pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Candidate RPC endpoints and how they are probed.
    pub endpoints: EndpointsConfig,

    /// Local connectivity checks.
    pub connectivity: ConnectivityConfig,

    /// Retry settings for blockhash fetches and dispatch.
    pub submission: RetryConfig,

    /// Confirmation polling settings.
    pub confirmation: ConfirmationConfig,

    /// Staking protocol parameters.
    pub staking: StakingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Candidate RPC endpoints in priority order.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Endpoint URLs, highest priority first.
    pub candidates: Vec<String>,

    /// Liveness probe timeout per candidate in seconds.
    pub probe_timeout_secs: u64,

    /// Outer retry of a full selection round.
    pub selection: RetryConfig,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                "https://api.devnet.solana.com".to_string(),
                "https://rpc.ankr.com/solana_devnet".to_string(),
            ],
            probe_timeout_secs: 30,
            selection: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1000,
                max_delay_ms: 8000,
                // A round may probe every candidate, so the round itself gets room.
                attempt_timeout_ms: 120_000,
                rate_limit_multiplier: 4,
                jitter: true,
            },
        }
    }
}

/// Connectivity monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Well-known RPC URL used for the active liveness probe.
    pub probe_url: String,

    /// Probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Address used to check that the OS has a network route at all.
    pub route_check_address: String,

    /// Interval between background checks in seconds.
    pub check_interval_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://api.devnet.solana.com".to_string(),
            probe_timeout_secs: 5,
            route_check_address: "1.1.1.1:53".to_string(),
            check_interval_secs: 15,
        }
    }
}

/// Retry configuration shared by every guarded call site.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Timeout for a single attempt in milliseconds.
    pub attempt_timeout_ms: u64,

    /// Base delay multiplier for rate-limited failures.
    pub rate_limit_multiplier: u32,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 4000,
            attempt_timeout_ms: 15_000,
            rate_limit_multiplier: 4,
            jitter: true,
        }
    }
}

/// Confirmation tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Commitment level a transaction must reach to count as confirmed.
    pub commitment: Commitment,

    /// Interval between status polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Upper bound on the whole confirmation wait in seconds.
    pub max_wait_secs: u64,

    /// Retry settings for status and height lookups.
    pub retry: RetryConfig,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            poll_interval_ms: 2000,
            max_wait_secs: 90,
            retry: RetryConfig {
                max_attempts: 6,
                base_delay_ms: 500,
                max_delay_ms: 16_000,
                attempt_timeout_ms: 15_000,
                rate_limit_multiplier: 4,
                jitter: true,
            },
        }
    }
}

/// Staking protocol parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Stake pool program ID (base58).
    pub program_id: String,

    /// Stake pool state account (base58).
    pub pool_address: String,

    /// Minimum stake/unstake amount in SOL.
    pub min_amount_sol: f64,

    /// Maximum stake/unstake amount in SOL.
    pub max_amount_sol: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            program_id: "AH6kLi3PTnRqEqFpNELtBPgnyhdZZSeMeowqPK9aGQ4W".to_string(),
            pool_address: "CFXepqvtoz7oPno4vTvqrVp2Vzt43vUebSJpEaqzGoJA".to_string(),
            min_amount_sol: 0.1,
            max_amount_sol: 1000.0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

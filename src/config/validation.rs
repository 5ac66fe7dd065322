//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{PipelineConfig, RetryConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.candidates.is_empty() {
        errors.push(ValidationError::new("endpoints.candidates", "at least one endpoint is required"));
    }
    for (i, candidate) in config.endpoints.candidates.iter().enumerate() {
        check_url(&format!("endpoints.candidates[{}]", i), candidate, &mut errors);
    }
    if config.endpoints.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("endpoints.probe_timeout_secs", "must be greater than 0"));
    }
    check_retry("endpoints.selection", &config.endpoints.selection, &mut errors);

    check_url("connectivity.probe_url", &config.connectivity.probe_url, &mut errors);
    if config.connectivity.probe_timeout_secs == 0 {
        errors.push(ValidationError::new("connectivity.probe_timeout_secs", "must be greater than 0"));
    }
    if config.connectivity.route_check_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "connectivity.route_check_address",
            format!("'{}' is not a socket address", config.connectivity.route_check_address),
        ));
    }

    check_retry("submission", &config.submission, &mut errors);
    check_retry("confirmation.retry", &config.confirmation.retry, &mut errors);
    if config.confirmation.poll_interval_ms == 0 {
        errors.push(ValidationError::new("confirmation.poll_interval_ms", "must be greater than 0"));
    }
    if config.confirmation.max_wait_secs == 0 {
        errors.push(ValidationError::new("confirmation.max_wait_secs", "must be greater than 0"));
    }

    let staking = &config.staking;
    if !is_pubkey(&staking.program_id) {
        errors.push(ValidationError::new("staking.program_id", "must be a base58 public key"));
    }
    if !is_pubkey(&staking.pool_address) {
        errors.push(ValidationError::new("staking.pool_address", "must be a base58 public key"));
    }
    if !(staking.min_amount_sol.is_finite() && staking.min_amount_sol > 0.0) {
        errors.push(ValidationError::new("staking.min_amount_sol", "must be a positive number"));
    }
    if !(staking.max_amount_sol.is_finite() && staking.max_amount_sol >= staking.min_amount_sol) {
        errors.push(ValidationError::new("staking.max_amount_sol", "must not be below min_amount_sol"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_pubkey(value: &str) -> bool {
    bs58::decode(value).into_vec().map(|k| k.len() == 32).unwrap_or(false)
}

fn check_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(field, format!("unsupported scheme '{}'", url.scheme()))),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

fn check_retry(field: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(format!("{}.max_attempts", field), "must be greater than 0"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{}.base_delay_ms", field),
            "must not exceed max_delay_ms",
        ));
    }
    if retry.attempt_timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{}.attempt_timeout_ms", field), "must be greater than 0"));
    }
    if retry.rate_limit_multiplier == 0 {
        errors.push(ValidationError::new(format!("{}.rate_limit_multiplier", field), "must be at least 1"));
    }
}

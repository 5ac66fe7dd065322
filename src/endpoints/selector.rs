//! Healthy endpoint selection.
//!
//! # Responsibilities
//! - Probe candidates in priority order and pick the first live one
//! - Retry whole selection rounds with backoff
//! - Cache the selected endpoint until it is reported bad or invalidated
//!
//! # Design Decisions
//! - The cache is an `ArcSwapOption`, replaced wholesale, never mutated
//! - A cache hit does no network I/O
//! - Only one selection round runs at a time; waiters reuse its result

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use crate::blockchain::client::{RpcClient, RpcConnector};
use crate::blockchain::types::{BlockchainError, Commitment, RpcError};
use crate::config::EndpointsConfig;
use crate::endpoints::endpoint::{Endpoint, TrackedEndpoint};
use crate::observability::metrics;
use crate::resilience::retries::{RetryError, RetryPolicy, Retryability, Retryable};
use crate::resilience::timeouts::{with_timeout, TimedOut};

/// An endpoint that passed its most recent probe.
#[derive(Clone)]
pub struct HealthyEndpoint {
    pub url: Url,
    pub client: Arc<dyn RpcClient>,
}

impl fmt::Debug for HealthyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthyEndpoint").field("url", &self.url.as_str()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no healthy RPC endpoint after {attempts} selection rounds: {last}")]
    Unavailable { attempts: u32, last: String },
}

/// Every candidate failed its probe in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoundFailed {
    probed: usize,
    /// Every probe failure was a rate limit.
    all_rate_limited: bool,
    last: Option<String>,
}

impl fmt::Display for RoundFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last {
            Some(last) => write!(f, "all {} candidates failed, last: {}", self.probed, last),
            None => write!(f, "no candidates configured"),
        }
    }
}

impl Retryable for RoundFailed {
    fn retryability(&self) -> Retryability {
        if self.probed == 0 {
            Retryability::Fatal
        } else if self.all_rate_limited {
            Retryability::RateLimited
        } else {
            Retryability::Transient
        }
    }
}

/// Picks a live RPC endpoint from a prioritized candidate list.
pub struct EndpointSelector {
    connector: Arc<dyn RpcConnector>,
    endpoints: ArcSwap<Vec<Arc<TrackedEndpoint>>>,
    cached: ArcSwapOption<HealthyEndpoint>,
    selecting: Mutex<()>,
    probe_timeout: Duration,
    policy: RetryPolicy,
}

impl EndpointSelector {
    pub fn new(
        connector: Arc<dyn RpcConnector>,
        candidates: Vec<Url>,
        probe_timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        let endpoints = candidates
            .into_iter()
            .map(|url| Arc::new(TrackedEndpoint::new(url.clone(), connector.connect(&url))))
            .collect();
        Self {
            connector,
            endpoints: ArcSwap::from_pointee(endpoints),
            cached: ArcSwapOption::empty(),
            selecting: Mutex::new(()),
            probe_timeout,
            policy,
        }
    }

    pub fn from_config(connector: Arc<dyn RpcConnector>, config: &EndpointsConfig) -> Result<Self, BlockchainError> {
        Ok(Self::new(
            connector,
            parse_candidates(&config.candidates)?,
            Duration::from_secs(config.probe_timeout_secs),
            RetryPolicy::from(&config.selection),
        ))
    }

    /// Return the cached healthy endpoint, or probe candidates for a new one.
    pub async fn select_healthy(&self) -> Result<Arc<HealthyEndpoint>, SelectError> {
        if let Some(cached) = self.cached.load_full() {
            return Ok(cached);
        }

        let _round = self.selecting.lock().await;
        // Another caller may have finished a round while we waited.
        if let Some(cached) = self.cached.load_full() {
            return Ok(cached);
        }

        let endpoints = self.endpoints.load_full();
        let policy = self.round_policy(endpoints.len());
        let last_failure = StdMutex::new(None);
        let result = policy
            .run("select_endpoint", || self.probe_round(&endpoints, &last_failure))
            .await;
        match result {
            Ok(selected) => {
                // Candidates swapped mid-round: use the result but do not cache it.
                if Arc::ptr_eq(&endpoints, &*self.endpoints.load()) {
                    self.cached.store(Some(selected.clone()));
                }
                tracing::info!(endpoint = %selected.url, "Selected RPC endpoint");
                Ok(selected)
            }
            Err(e) => {
                let attempts = match &e {
                    RetryError::Exhausted { attempts, .. } => *attempts,
                    RetryError::Aborted(_) => 1,
                };
                tracing::error!(attempts, error = %e, "No healthy RPC endpoint");
                let last = last_failure
                    .into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .unwrap_or_else(|| e.into_last().to_string());
                Err(SelectError::Unavailable { attempts, last })
            }
        }
    }

    /// The selection policy with a round deadline long enough to try every
    /// candidate up to its own timeout.
    fn round_policy(&self, candidates: usize) -> RetryPolicy {
        let full_round = self
            .probe_timeout
            .saturating_mul(u32::try_from(candidates).unwrap_or(u32::MAX));
        let mut policy = self.policy.clone();
        policy.attempt_timeout = policy.attempt_timeout.max(full_round);
        policy
    }

    async fn probe_round(
        &self,
        endpoints: &[Arc<TrackedEndpoint>],
        last_failure: &StdMutex<Option<String>>,
    ) -> Result<Arc<HealthyEndpoint>, RoundFailed> {
        let mut failed = RoundFailed {
            probed: 0,
            all_rate_limited: true,
            last: None,
        };

        for endpoint in endpoints {
            failed.probed += 1;
            let probe = endpoint.client.get_block_height(Commitment::Confirmed);
            let error = match with_timeout(self.probe_timeout, probe).await {
                Ok(Ok(height)) => {
                    endpoint.mark(true);
                    metrics::record_probe(endpoint.url.as_str(), true);
                    tracing::debug!(endpoint = %endpoint.url, block_height = height, "Probe succeeded");
                    return Ok(Arc::new(HealthyEndpoint {
                        url: endpoint.url.clone(),
                        client: endpoint.client.clone(),
                    }));
                }
                Ok(Err(e)) => e,
                Err(TimedOut(limit)) => RpcError::Timeout(limit),
            };

            endpoint.mark(false);
            metrics::record_probe(endpoint.url.as_str(), false);
            tracing::warn!(endpoint = %endpoint.url, error = %error, "Probe failed");
            failed.all_rate_limited &= matches!(error, RpcError::RateLimited(_));
            let detail = format!("{}: {}", endpoint.url, error);
            // Kept outside the round so a round cut short still reports it.
            *last_failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(detail.clone());
            failed.last = Some(detail);
        }

        Err(failed)
    }

    /// Drop the cached endpoint if it is `url`.
    pub fn report_failure(&self, url: &Url) {
        let previous = self.cached.rcu(|current| match current {
            Some(endpoint) if endpoint.url == *url => None,
            other => other.clone(),
        });
        if previous.is_some_and(|endpoint| endpoint.url == *url) {
            tracing::warn!(endpoint = %url, "Dropping cached endpoint after failure");
        }
        if let Some(endpoint) = self.endpoints.load().iter().find(|e| e.url == *url) {
            endpoint.mark(false);
        }
    }

    /// Force the next selection to re-probe.
    pub fn invalidate(&self) {
        if self.cached.swap(None).is_some() {
            tracing::debug!("Endpoint cache invalidated");
        }
    }

    /// Replace the candidate list. Known endpoints keep their client and health.
    pub fn set_candidates(&self, candidates: Vec<Url>) {
        let current = self.endpoints.load_full();
        let endpoints: Vec<Arc<TrackedEndpoint>> = candidates
            .into_iter()
            .map(|url| match current.iter().find(|e| e.url == url) {
                Some(existing) => existing.clone(),
                None => Arc::new(TrackedEndpoint::new(url.clone(), self.connector.connect(&url))),
            })
            .collect();
        tracing::info!(candidates = endpoints.len(), "Endpoint candidates updated");
        self.endpoints.store(Arc::new(endpoints));
        self.invalidate();
    }

    pub fn cached(&self) -> Option<Arc<HealthyEndpoint>> {
        self.cached.load_full()
    }

    pub fn candidates(&self) -> Vec<Url> {
        self.endpoints.load().iter().map(|e| e.url.clone()).collect()
    }

    /// Health table of all candidates, in priority order.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.endpoints.load().iter().map(|e| e.snapshot()).collect()
    }
}

impl fmt::Debug for EndpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSelector")
            .field("endpoints", &self.endpoints.load())
            .field("cached", &self.cached.load_full().map(|e| e.url.to_string()))
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

/// Parse configured candidate URLs.
pub fn parse_candidates(candidates: &[String]) -> Result<Vec<Url>, BlockchainError> {
    candidates
        .iter()
        .map(|raw| {
            Url::parse(raw).map_err(|e| BlockchainError::InvalidEndpoint {
                url: raw.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_failure_classes() {
        let empty = RoundFailed { probed: 0, all_rate_limited: true, last: None };
        assert_eq!(empty.retryability(), Retryability::Fatal);

        let throttled = RoundFailed { probed: 2, all_rate_limited: true, last: Some("429".into()) };
        assert_eq!(throttled.retryability(), Retryability::RateLimited);

        let mixed = RoundFailed { probed: 2, all_rate_limited: false, last: Some("503".into()) };
        assert_eq!(mixed.retryability(), Retryability::Transient);
    }

    #[test]
    fn test_parse_candidates() {
        let urls = parse_candidates(&["https://a.example".to_string(), "http://b.example:8899".to_string()]).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].port(), Some(8899));

        assert!(matches!(
            parse_candidates(&["::nope".to_string()]),
            Err(BlockchainError::InvalidEndpoint { .. })
        ));
    }
}

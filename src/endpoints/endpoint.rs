//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single candidate RPC endpoint
//! - Track the result of its most recent probe
//! - Own the RPC client used to talk to it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::time::Instant;
use url::Url;

use crate::blockchain::client::RpcClient;

/// Health view of one candidate endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    /// Result of the most recent probe; false until probed.
    pub last_known_healthy: bool,
    /// When the endpoint was last probed, if ever.
    pub last_checked_at: Option<Instant>,
}

/// A candidate endpoint together with its client and live health state.
pub(crate) struct TrackedEndpoint {
    pub url: Url,
    pub client: Arc<dyn RpcClient>,
    healthy: AtomicBool,
    checked_at: ArcSwapOption<Instant>,
}

impl TrackedEndpoint {
    pub fn new(url: Url, client: Arc<dyn RpcClient>) -> Self {
        Self {
            url,
            client,
            healthy: AtomicBool::new(false),
            checked_at: ArcSwapOption::empty(),
        }
    }

    /// Record the result of a probe.
    pub fn mark(&self, healthy: bool) {
        let was = self.healthy.swap(healthy, Ordering::Relaxed);
        self.checked_at.store(Some(Arc::new(Instant::now())));
        if was != healthy {
            if healthy {
                tracing::info!(endpoint = %self.url, "Endpoint became healthy");
            } else {
                tracing::warn!(endpoint = %self.url, "Endpoint became unhealthy");
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Endpoint {
        Endpoint {
            url: self.url.clone(),
            last_known_healthy: self.is_healthy(),
            last_checked_at: self.checked_at.load_full().map(|at| *at),
        }
    }
}

impl std::fmt::Debug for TrackedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedEndpoint")
            .field("url", &self.url.as_str())
            .field("healthy", &self.is_healthy())
            .finish()
    }
}

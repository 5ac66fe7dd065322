//! Connectivity monitoring.
//!
//! # Responsibilities
//! - Decide whether the client is online before any work is attempted
//! - Remember the last known state and broadcast transitions
//! - Invalidate the endpoint cache when connectivity returns
//!
//! Two signals must agree: the OS must have a route out, and a well-known RPC
//! node must answer a `getHealth` probe within `probe_timeout`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::blockchain::client::{RpcClient, RpcConnector};
use crate::blockchain::types::BlockchainError;
use crate::config::ConnectivityConfig;
use crate::endpoints::EndpointSelector;
use crate::observability::metrics;
use crate::resilience::timeouts::{with_timeout, TimedOut};

/// Connectivity state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Unknown = 0,
    Online = 1,
    Offline = 2,
}

impl From<u8> for ConnectivityState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectivityState::Online,
            2 => ConnectivityState::Offline,
            _ => ConnectivityState::Unknown,
        }
    }
}

/// Emitted on every online/offline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Local network interface signal.
#[async_trait]
pub trait InterfaceSignal: Send + Sync {
    /// Whether the OS has a usable route out.
    async fn has_route(&self) -> bool;
}

/// Checks for a route by connecting a UDP socket. Nothing is sent.
#[derive(Debug, Clone)]
pub struct RouteSignal {
    target: SocketAddr,
}

impl RouteSignal {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

#[async_trait]
impl InterfaceSignal for RouteSignal {
    async fn has_route(&self) -> bool {
        let local: SocketAddr = if self.target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = match UdpSocket::bind(local).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to bind route check socket");
                return false;
            }
        };
        match socket.connect(self.target).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(target = %self.target, error = %e, "No route");
                false
            }
        }
    }
}

/// Tracks whether the client can reach the network.
pub struct ConnectivityMonitor {
    signal: Arc<dyn InterfaceSignal>,
    probe: Arc<dyn RpcClient>,
    probe_timeout: Duration,
    check_interval: Duration,
    state: AtomicU8,
    events: broadcast::Sender<ConnectivityEvent>,
    selector: Option<Arc<EndpointSelector>>,
}

impl ConnectivityMonitor {
    pub fn new(
        signal: Arc<dyn InterfaceSignal>,
        probe: Arc<dyn RpcClient>,
        probe_timeout: Duration,
        check_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            signal,
            probe,
            probe_timeout,
            check_interval,
            state: AtomicU8::new(ConnectivityState::Unknown as u8),
            events,
            selector: None,
        }
    }

    pub fn from_config(config: &ConnectivityConfig, connector: &dyn RpcConnector) -> Result<Self, BlockchainError> {
        let probe_url = Url::parse(&config.probe_url).map_err(|e| BlockchainError::InvalidEndpoint {
            url: config.probe_url.clone(),
            reason: e.to_string(),
        })?;
        let target: SocketAddr =
            config
                .route_check_address
                .parse()
                .map_err(|e: std::net::AddrParseError| BlockchainError::InvalidEndpoint {
                    url: config.route_check_address.clone(),
                    reason: e.to_string(),
                })?;
        Ok(Self::new(
            Arc::new(RouteSignal::new(target)),
            connector.connect(&probe_url),
            Duration::from_secs(config.probe_timeout_secs),
            Duration::from_secs(config.check_interval_secs),
        ))
    }

    /// Invalidate `selector`'s cache whenever connectivity comes back.
    pub fn with_selector(mut self, selector: Arc<EndpointSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    /// Last observed state, without probing.
    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from(self.state.load(Ordering::Relaxed))
    }

    /// Check both signals now.
    pub async fn is_online(&self) -> bool {
        let online = self.signal.has_route().await && self.probe_node().await;
        self.record(online);
        online
    }

    async fn probe_node(&self) -> bool {
        match with_timeout(self.probe_timeout, self.probe.get_health()).await {
            Ok(Ok(())) => true,
            // The node answered, so the network is up even if the node is not.
            Ok(Err(e)) if e.node_answered() => {
                tracing::debug!(endpoint = %self.probe.url(), error = %e, "Probe node answered with an error");
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %self.probe.url(), error = %e, "Connectivity probe failed");
                false
            }
            Err(TimedOut(limit)) => {
                tracing::debug!(endpoint = %self.probe.url(), timeout = ?limit, "Connectivity probe timed out");
                false
            }
        }
    }

    fn record(&self, online: bool) {
        let next = if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        };
        let previous = ConnectivityState::from(self.state.swap(next as u8, Ordering::Relaxed));
        if previous == next {
            return;
        }

        metrics::record_connectivity(online);
        let event = if online {
            tracing::info!(previous = ?previous, "Network online");
            if let Some(selector) = &self.selector {
                selector.invalidate();
            }
            ConnectivityEvent::Online
        } else {
            tracing::warn!(previous = ?previous, "Network offline");
            ConnectivityEvent::Offline
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Re-check on an interval until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.check_interval, probe = %self.probe.url(), "Connectivity monitor starting");

        let mut ticker = time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.is_online().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Connectivity monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("probe", &self.probe.url().as_str())
            .field("state", &self.state())
            .finish()
    }
}

//! Startup wiring.
//!
//! # Responsibilities
//! - Turn a validated `PipelineConfig` into live components
//! - Share one RPC connector between selection and connectivity probing
//! - Hand out orchestrators bound to a wallet
//!
//! # Design Decisions
//! - Fail fast: an unusable address or URL is a startup error
//! - No network I/O happens here; the first probe runs on first use

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::blockchain::client::{HttpConnector, RpcConnector};
use crate::blockchain::confirmation::ConfirmationTracker;
use crate::blockchain::instructions::{ProtocolSdk, StakePoolProgram};
use crate::blockchain::transaction::TransactionSubmitter;
use crate::blockchain::types::{BlockchainError, Commitment};
use crate::blockchain::wallet::WalletSigner;
use crate::config::PipelineConfig;
use crate::endpoints::EndpointSelector;
use crate::health::ConnectivityMonitor;
use crate::resilience::retries::RetryPolicy;
use crate::staking::{AmountLimits, StakingOperationOrchestrator};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("startup failed: {0}")]
    Blockchain(#[from] BlockchainError),
}

/// The long-lived components of one pipeline.
pub struct Pipeline {
    pub config: PipelineConfig,
    pub connector: Arc<dyn RpcConnector>,
    pub selector: Arc<EndpointSelector>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub sdk: Arc<dyn ProtocolSdk>,
}

impl Pipeline {
    /// Build the pipeline over HTTP JSON-RPC.
    pub fn build(config: PipelineConfig) -> Result<Self, StartupError> {
        let connector = HttpConnector::new(Duration::from_secs(config.endpoints.probe_timeout_secs))?;
        Self::with_connector(config, Arc::new(connector))
    }

    /// Build the pipeline over a caller-supplied connector.
    pub fn with_connector(config: PipelineConfig, connector: Arc<dyn RpcConnector>) -> Result<Self, StartupError> {
        let selector = Arc::new(EndpointSelector::from_config(connector.clone(), &config.endpoints)?);
        let monitor = Arc::new(
            ConnectivityMonitor::from_config(&config.connectivity, connector.as_ref())?.with_selector(selector.clone()),
        );
        let sdk: Arc<dyn ProtocolSdk> = Arc::new(StakePoolProgram::from_config(&config.staking)?);

        tracing::info!(
            candidates = config.endpoints.candidates.len(),
            commitment = %config.confirmation.commitment,
            program_id = %config.staking.program_id,
            "Pipeline initialized"
        );

        Ok(Self {
            config,
            connector,
            selector,
            monitor,
            sdk,
        })
    }

    /// An orchestrator that signs with `wallet`.
    pub fn orchestrator(&self, wallet: Arc<dyn WalletSigner>) -> StakingOperationOrchestrator {
        // A finalized blockhash is older and leaves less of the validity window.
        let read_commitment = self.config.confirmation.commitment.min(Commitment::Confirmed);
        let submitter = TransactionSubmitter::new(wallet, self.sdk.clone(), RetryPolicy::from(&self.config.submission))
            .with_commitment(read_commitment);
        StakingOperationOrchestrator::new(
            self.monitor.clone(),
            self.selector.clone(),
            submitter,
            ConfirmationTracker::from_config(&self.config.confirmation),
            AmountLimits::from(&self.config.staking),
        )
    }
}

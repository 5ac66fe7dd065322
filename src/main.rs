//! stakeflow command line.
//!
//! ```text
//! stakeflow [--config stakeflow.toml] probe
//! stakeflow status <SIGNATURE>
//! stakeflow balance <ADDRESS>
//! stakeflow pool
//! stakeflow watch
//! ```
//!
//! Every subcommand goes through the same connectivity check, endpoint
//! selection and retry policies as staking operations do.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use stakeflow::blockchain::pool::fetch_pool_state;
use stakeflow::blockchain::types::Address;
use stakeflow::config::loader::load_config;
use stakeflow::config::watcher::ConfigWatcher;
use stakeflow::endpoints::selector::parse_candidates;
use stakeflow::health::ConnectivityEvent;
use stakeflow::lifecycle::{wait_for_signal, Pipeline, Shutdown};
use stakeflow::observability::{logging, metrics};
use stakeflow::resilience::RetryPolicy;
use stakeflow::staking::validation::lamports_to_sol;
use stakeflow::PipelineConfig;

#[derive(Parser)]
#[command(name = "stakeflow")]
#[command(about = "Resilient submit-and-confirm pipeline for Solana staking", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity and select a healthy RPC endpoint
    Probe,
    /// Look up a transaction signature, including history
    Status { signature: String },
    /// Show the balance of an account
    Balance { address: String },
    /// Show the stake pool's totals
    Pool,
    /// Monitor connectivity and reload configuration until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(config = ?cli.config, "stakeflow v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pipeline = Pipeline::build(config)?;

    match cli.command {
        Commands::Probe => probe(&pipeline).await,
        Commands::Status { signature } => status(&pipeline, &signature).await,
        Commands::Balance { address } => balance(&pipeline, &address).await,
        Commands::Pool => pool(&pipeline).await,
        Commands::Watch => watch(&pipeline, cli.config).await,
    }
}

async fn probe(pipeline: &Pipeline) -> Result<(), Box<dyn Error>> {
    if !pipeline.monitor.is_online().await {
        return Err("network offline".into());
    }

    let selected = pipeline.selector.select_healthy().await;
    let endpoints: Vec<_> = pipeline
        .selector
        .snapshot()
        .into_iter()
        .map(|e| {
            json!({
                "url": e.url.as_str(),
                "healthy": e.last_known_healthy,
                "probed": e.last_checked_at.is_some(),
            })
        })
        .collect();
    let endpoint = selected?;

    let commitment = pipeline.config.confirmation.commitment;
    let policy = RetryPolicy::from(&pipeline.config.confirmation.retry);
    let height = policy
        .run("get_block_height", || endpoint.client.get_block_height(commitment))
        .await?;

    print_json(&json!({
        "online": true,
        "selected": endpoint.url.as_str(),
        "block_height": height,
        "commitment": commitment,
        "endpoints": endpoints,
    }))
}

async fn status(pipeline: &Pipeline, signature: &str) -> Result<(), Box<dyn Error>> {
    if !pipeline.monitor.is_online().await {
        return Err("network offline".into());
    }
    let endpoint = pipeline.selector.select_healthy().await?;
    let policy = RetryPolicy::from(&pipeline.config.confirmation.retry);
    let status = policy
        .run("get_signature_status", || endpoint.client.get_signature_status(signature, true))
        .await?;

    let target = pipeline.config.confirmation.commitment;
    print_json(&json!({
        "signature": signature,
        "found": status.is_some(),
        "reached_commitment": status.as_ref().is_some_and(|s| s.err.is_none() && s.satisfies(target)),
        "status": status,
    }))
}

async fn balance(pipeline: &Pipeline, address: &str) -> Result<(), Box<dyn Error>> {
    let address = Address::parse(address)?;
    if !pipeline.monitor.is_online().await {
        return Err("network offline".into());
    }
    let endpoint = pipeline.selector.select_healthy().await?;
    let policy = RetryPolicy::from(&pipeline.config.submission);
    let commitment = pipeline.config.confirmation.commitment;
    let lamports = policy
        .run("get_balance", || endpoint.client.get_balance(address.as_str(), commitment))
        .await?;

    print_json(&json!({
        "address": address.as_str(),
        "lamports": lamports,
        "sol": lamports_to_sol(lamports),
    }))
}

async fn pool(pipeline: &Pipeline) -> Result<(), Box<dyn Error>> {
    if !pipeline.monitor.is_online().await {
        return Err("network offline".into());
    }
    let endpoint = pipeline.selector.select_healthy().await?;
    let policy = RetryPolicy::from(&pipeline.config.submission);
    let state = fetch_pool_state(
        endpoint.client.as_ref(),
        &policy,
        pipeline.sdk.program_id(),
        pipeline.sdk.pool(),
        pipeline.config.confirmation.commitment,
    )
    .await?;

    print_json(&json!({
        "pool": pipeline.sdk.pool().as_str(),
        "initialized": state.is_some(),
        "total_staked_sol": state.map(|s| lamports_to_sol(s.total_staked)),
        "state": state,
    }))
}

async fn watch(pipeline: &Pipeline, config_path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let shutdown = Shutdown::new();
    let mut connectivity = pipeline.monitor.subscribe();

    let monitor = pipeline.monitor.clone();
    let monitor_shutdown = shutdown.subscribe();
    let monitor_task = tokio::spawn(async move { monitor.run(monitor_shutdown).await });

    let (_watcher, mut reloads) = match config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(&path);
            (Some(watcher.run()?), Some(rx))
        }
        None => (None, None),
    };

    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            event = connectivity.recv() => match event {
                Ok(ConnectivityEvent::Online) => println!("online"),
                Ok(ConnectivityEvent::Offline) => println!("offline"),
                Err(e) => tracing::debug!(error = %e, "Connectivity event stream lagged"),
            },
            Some(update) = next_reload(&mut reloads) => {
                match parse_candidates(&update.endpoints.candidates) {
                    Ok(candidates) if candidates != pipeline.selector.candidates() => {
                        pipeline.selector.set_candidates(candidates);
                        println!("endpoint candidates reloaded");
                    }
                    Ok(_) => tracing::debug!("Config reloaded, candidates unchanged"),
                    Err(e) => tracing::error!(error = %e, "Ignoring reloaded candidates"),
                }
            }
            _ = &mut signal => break,
        }
    }

    shutdown.trigger();
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "Connectivity monitor task failed");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn next_reload(
    reloads: &mut Option<tokio::sync::mpsc::UnboundedReceiver<PipelineConfig>>,
) -> Option<PipelineConfig> {
    match reloads {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

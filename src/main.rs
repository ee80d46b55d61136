//! claimdrop - Claimable-Balance Distribution Bot
//!
//! Distributes a configured set of assets to requesters by creating
//! ledger-level claimable balances in bounded batches.
//!
//! ## Features
//!
//! - **Batched Submission**: up to 100 claimable-balance operations per transaction
//! - **Resilient Retries**: structured error classification with fixed backoff
//! - **Trustline Preflight**: refuses to start if the distributor is missing a trustline
//! - **Cooldown Guard**: per-requester rate limiting of repeat requests
//! - **Secret Boundary**: signing seed scrubbed from every outward error
//! - **Metrics**: Prometheus endpoint for counters and latencies

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod batch;
mod catalog;
mod config;
mod cooldown;
mod endpoints;
mod ledger;
mod metrics;
mod observability;
mod orchestrator;
mod preflight;
mod signer;
mod strkey;
mod submitter;
mod tx;
mod types;

use catalog::{AssetCatalog, FileCatalog};
use config::Config;
use cooldown::CooldownGuard;
use ledger::HorizonClient;
use orchestrator::{DistributionOrchestrator, LogReplyChannel};
use signer::DistributorSigner;
use submitter::{SubmitterConfig, TransactionSubmitter};
use types::{AppState, AssetSpec, RequestReceiver, RequestSender};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("🚀 Starting claimdrop distribution bot");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let config = Config::from_file_with_env(&args.config)?;

    // The seed comes from the environment only; never from the config file
    let secret = std::env::var(&config.distributor.secret_env).with_context(|| {
        format!(
            "Environment variable {} with the signing seed is not set",
            config.distributor.secret_env
        )
    })?;
    let signer = Arc::new(
        DistributorSigner::from_secret_seed(secret.trim())
            .context("Failed to load distributor signing key")?,
    );
    info!("🔑 Distributor account: {}", signer.account_id());

    info!("🌐 Ledger endpoint: {}", config.horizon.endpoint);
    let ledger: Arc<dyn ledger::LedgerClient> = Arc::new(HorizonClient::new(
        &config.horizon.endpoint,
        Duration::from_secs(config.horizon.timeout_secs),
    )?);

    info!("📦 Loading asset catalog from: {}", config.catalog.path);
    let mut catalog = FileCatalog::load(&config.catalog.path)
        .with_context(|| format!("Failed to load catalog from {}", config.catalog.path))?;
    if let Some(primary) = &config.catalog.primary {
        let primary = AssetSpec::new(&primary.code, primary.issuer.as_deref(), &primary.amount)
            .context("Invalid primary asset in config")?;
        catalog = catalog.with_primary(primary);
    }
    info!("   {} asset(s) configured", catalog.len());

    // Fail closed: a single missing trustline blocks the whole service
    info!("🔎 Running trustline preflight check");
    if let Err(e) = preflight::check(ledger.as_ref(), signer.account_id(), catalog.assets()).await
    {
        error!("❌ Preflight failed: {}", e);
        anyhow::bail!("preflight failed: {}", e);
    }
    info!("✅ Preflight passed, all trustlines in place");

    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        info!("📊 Starting metrics server on port {}", metrics_port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let app_state = AppState::new();
    let cooldown = Arc::new(CooldownGuard::new(config.distribution.cooldown_secs));
    let submitter = Arc::new(TransactionSubmitter::new(
        Arc::clone(&ledger),
        Arc::clone(&signer),
        SubmitterConfig {
            base_fee: config.distribution.base_fee,
            validity_window_secs: config.distribution.validity_window_secs,
            max_attempts: config.distribution.max_attempts,
            network_passphrase: config.distributor.network_passphrase.clone(),
        },
    ));
    let orchestrator = Arc::new(DistributionOrchestrator::new(
        Arc::new(catalog),
        submitter,
        cooldown,
        // The messaging front-end attaches its own ReplyChannel here;
        // until then replies go to the log.
        Arc::new(LogReplyChannel),
        app_state.clone(),
        config.distribution.max_ops_per_tx,
    ));

    // The messaging front-end feeds requests into this channel
    let (_request_tx, request_rx): (RequestSender, RequestReceiver) = mpsc::unbounded_channel();

    info!("✅ All components initialized, serving distribution requests");
    run_event_loop(orchestrator, app_state, request_rx).await?;

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "claimdrop=debug,info"
    } else {
        "claimdrop=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    Ok(())
}

/// Main event loop
async fn run_event_loop(
    orchestrator: Arc<DistributionOrchestrator>,
    app_state: AppState,
    mut request_rx: RequestReceiver,
) -> Result<()> {
    info!("Event loop started");

    let mut stats_interval = tokio::time::interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            // Handle incoming distribution requests; each runs on its own
            // task, queuing only for the shared submission slot
            Some(request) = request_rx.recv() => {
                info!(
                    requester_id = request.requester_id,
                    correlation = %request.correlation,
                    "📥 Received distribution request"
                );
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    orchestrator.handle_request(request).await;
                });
            }

            // Periodic statistics reporting
            _ = stats_interval.tick() => {
                let stats = app_state.stats.read().await;
                info!("📊 Statistics:");
                info!("   Requests: {}", stats.requests_total);
                info!("   Successful distributions: {}", stats.distributions_success);
                info!("   Failed distributions: {}", stats.distributions_failed);
                info!("   Cooldown rejections: {}", stats.requests_cooldown_rejected);
                info!("   Batches submitted: {}", stats.batches_submitted);
            }

            // Graceful shutdown signal
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Received shutdown signal");
                break;
            }
        }
    }

    info!("👋 Shutting down gracefully...");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Include test modules
    mod orchestrator_tests;
    mod submitter_tests;
    mod test_helpers;

    #[test]
    fn test_default_distribution_config() {
        let config = config::DistributionConfig::default();
        assert_eq!(config.max_ops_per_tx, tx::MAX_OPS_PER_TX);
        assert_eq!(config.max_attempts, 5);
    }
}

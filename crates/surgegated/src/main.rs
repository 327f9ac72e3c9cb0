//! surgegated — the SurgeGate daemon.
//!
//! Single binary that assembles every SurgeGate subsystem:
//! - Policy store + admission gate
//! - Decision oracle client
//! - Decision engine (approval queue)
//! - Control loop
//! - REST API
//!
//! # Usage
//!
//! ```text
//! surgegated run --config surgegate.toml --port 8080
//! surgegated check-config --config surgegate.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use surgegate_api::ApiState;
use surgegate_control::{ControlLoop, InsightBoard};
use surgegate_core::Config;
use surgegate_governance::DecisionEngine;
use surgegate_limiter::{AdmissionGate, PolicyStore, TenantDirectory};
use surgegate_oracle::{HttpOracle, RetryPolicy};

#[derive(Parser)]
#[command(name = "surgegated", about = "SurgeGate adaptive admission-control daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the API and run the control loop.
    Run {
        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config and PORT).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load, validate and print the effective configuration.
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config, port } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            run(config).await
        }
        Command::CheckConfig { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,surgegated=debug,surgegate=debug"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// File (if any), then environment, then validation.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_process_env()?;
    config.validate()?;
    Ok(config)
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("SurgeGate daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = PolicyStore::new(config.tiers.clone(), config.max_keys);
    let gate = AdmissionGate::new(
        TenantDirectory::new(config.api_keys.clone()),
        store.clone(),
        &config.resources,
    );
    let keys = gate.preload()?;
    info!(keys, resources = config.resources.len(), "policy store initialized");

    let oracle = HttpOracle::new(&config.oracle.base_url, config.oracle.model.clone())?;
    let retry = RetryPolicy::from_config(&config.oracle);
    info!(
        endpoint = oracle.endpoint(),
        model = oracle.model(),
        attempts = retry.attempts,
        attempt_timeout = ?retry.attempt_timeout,
        "oracle client initialized"
    );

    let engine = DecisionEngine::new(store.clone(), config.governance.clone());
    info!(
        min_confidence = config.governance.min_confidence,
        large_change_factor = config.governance.large_change_factor,
        pending_ttl_secs = config.governance.pending_ttl_secs,
        "decision engine initialized"
    );

    let board = InsightBoard::new();
    let control = ControlLoop::new(store, engine.clone(), Arc::new(oracle), retry, board.clone());

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let interval = config.control.interval();
    let control_handle = tokio::spawn(async move {
        control.run(interval, shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = surgegate_api::build_router(ApiState { gate, engine, board });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = control_handle.await;

    info!("SurgeGate daemon stopped");
    Ok(())
}

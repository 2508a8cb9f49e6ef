//! Offer Console: campaign publication and simulation orchestrator.
//!
//! Loads the store, recovers interrupted simulation runs, and serves the
//! management API until Ctrl-C, snapshotting the store along the way.

use campaign_api::ApiServer;
use campaign_core::config::{AppConfig, StoreConfig};
use campaign_core::random::thread_random;
use campaign_management::{ManagementState, ManagementStore, SimulationEngine};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "offer-console")]
#[command(about = "Campaign publication and simulation orchestrator")]
#[command(version)]
struct Cli {
    /// Instance identifier (overrides config)
    #[arg(long, env = "OFFER_CONSOLE__INSTANCE_ID")]
    instance_id: Option<String>,

    /// Bind address (overrides config)
    #[arg(long, env = "OFFER_CONSOLE__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "OFFER_CONSOLE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics exporter port (overrides config)
    #[arg(long, env = "OFFER_CONSOLE__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// JSON snapshot file to load on start and save to periodically
    #[arg(long, env = "OFFER_CONSOLE__STORE__SNAPSHOT_PATH")]
    snapshot_path: Option<String>,

    /// Seed demo campaigns and segments when the store starts empty
    #[arg(long, default_value_t = false)]
    seed_demo: bool,

    /// Close interrupted simulation runs as failed instead of resuming them
    #[arg(long, default_value_t = false)]
    orphan_interrupted: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "offer_console=info,campaign_management=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Offer Console starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(instance_id) = cli.instance_id {
        config.instance_id = instance_id;
    }
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if let Some(path) = cli.snapshot_path {
        config.store.snapshot_path = Some(path);
    }
    if cli.seed_demo {
        config.store.seed_demo_data = true;
    }
    if cli.orphan_interrupted {
        config.simulation.resume_interrupted = false;
    }

    info!(
        instance_id = %config.instance_id,
        http_port = config.api.http_port,
        control_policy = %config.controls.policy,
        snapshot_path = ?config.store.snapshot_path,
        "Configuration loaded"
    );

    let store = Arc::new(load_store(&config.store)?);
    let management = ManagementState::new(&config, store.clone(), thread_random())?;
    let api_server = ApiServer::new(config.clone(), management.clone());

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    recover_runs(&management.simulations);
    api_server.mark_ready();

    // Spawn store maintenance task
    let maintenance_store = store.clone();
    let maintenance_engine = management.simulations.clone();
    let store_config = config.store.clone();
    tokio::spawn(async move {
        let period = Duration::from_secs(store_config.snapshot_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            // Leases left by a dead process expire; pick those runs up.
            recover_runs(&maintenance_engine);
            save_snapshot(&maintenance_store, &store_config);
        }
    });

    info!("Offer Console is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http(shutdown_signal()).await?;

    save_snapshot(&store, &config.store);
    info!("Offer Console stopped");
    Ok(())
}

fn load_store(config: &StoreConfig) -> anyhow::Result<ManagementStore> {
    let store = match &config.snapshot_path {
        Some(path) => ManagementStore::from_snapshot_file(path)?,
        None => ManagementStore::new(),
    };
    if config.seed_demo_data && store.list_campaigns().is_empty() {
        return Ok(ManagementStore::with_demo_data());
    }
    Ok(store)
}

fn recover_runs(engine: &SimulationEngine) {
    match engine.recover_interrupted_runs() {
        Ok(report) if report.resumed.is_empty() && report.orphaned.is_empty() => {}
        Ok(report) => info!(
            resumed = report.resumed.len(),
            orphaned = report.orphaned.len(),
            skipped = report.skipped,
            "Recovered interrupted simulation runs"
        ),
        Err(e) => error!(error = %e, "Simulation run recovery failed"),
    }
}

fn save_snapshot(store: &ManagementStore, config: &StoreConfig) {
    if let Some(path) = &config.snapshot_path {
        if let Err(e) = store.save_snapshot(path) {
            error!(error = %e, path = %path, "Failed to save store snapshot");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

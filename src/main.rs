//! rfid-gate - RFID access-control service
//!
//! HTTP API for sensor (credential) and zone administration, access-event
//! evaluation and the gate barrier, backed by an in-memory store seeded
//! from config and mirrored to a JSONL audit file.
//!
//! Module structure:
//! - `domain/` - Core business types (Sensor, Zone, Barrier, AccessEvent)
//! - `io/` - External interfaces (HTTP API, auth, audit trail)
//! - `services/` - Business logic (Evaluator, Registry, Barrier, EventLog)
//! - `infra/` - Infrastructure (Config, Store)

use clap::Parser;
use rfid_gate::infra::{Config, Store};
use rfid_gate::io::{start_api_server, ApiContext, AuditLog, Authenticator};
use rfid_gate::services::{AccessEvaluator, BarrierService, EventLog, Registry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// rfid-gate - RFID access control service
#[derive(Parser, Debug)]
#[command(name = "rfid-gate", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Structured logging, level via RUST_LOG (default INFO)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("rfid-gate starting");

    let args = Args::parse();

    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        http_bind = %config.http_bind(),
        http_port = %config.http_port(),
        audit_enabled = %config.audit_enabled(),
        tokens = %config.tokens().len(),
        seed_zones = %config.seed_zones().len(),
        seed_sensors = %config.seed_sensors().len(),
        "config_loaded"
    );

    let store = Arc::new(Store::new());
    store.seed(&config)?;

    let audit = if config.audit_enabled() {
        Some(AuditLog::new(config.audit_file()))
    } else {
        None
    };

    let events = Arc::new(EventLog::new(store.clone(), audit));

    let ctx = Arc::new(ApiContext {
        site_id: config.site_id().to_string(),
        auth: Authenticator::from_config(&config),
        store: store.clone(),
        registry: Registry::new(store.clone()),
        evaluator: AccessEvaluator::new(store.clone(), events.clone()),
        barrier: BarrierService::new(store.clone(), events.clone()),
        events,
    });

    // Shutdown on Ctrl+C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    start_api_server(ctx, config.http_bind(), config.http_port(), shutdown_rx).await?;

    info!("rfid-gate shutdown complete");
    Ok(())
}

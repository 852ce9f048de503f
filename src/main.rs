//! datadog-entity-sync - Software catalog to Datadog entity synchronization
//!
//! This is the main entry point for the datadog-entity-sync service.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use datadog_entity_sync::catalog::{HttpCatalogClient, StaticTokenAuth};
use datadog_entity_sync::config::Config;
use datadog_entity_sync::datadog::DatadogClient;
use datadog_entity_sync::events::InMemoryEventBus;
use datadog_entity_sync::jobs::define_builtin_syncs;
use datadog_entity_sync::otel::{init_tracing, OtelProvider, SyncMetrics};
use datadog_entity_sync::server::{AppState, Server};
use datadog_entity_sync::sync::{Clients, SyncRegistryBuilder};

/// datadog-entity-sync - Software catalog to Datadog entity synchronization
#[derive(Parser, Debug)]
#[command(name = "datadog-entity-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "DATADOG_ENTITY_SYNC_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize OpenTelemetry provider
    let otel_provider = OtelProvider::new(&config.otel)?;

    // Initialize tracing/logging
    init_tracing(&otel_provider, &config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting datadog-entity-sync"
    );

    let metrics = otel_provider
        .is_enabled()
        .then(|| Arc::new(SyncMetrics::new(&otel_provider.meter())));

    // Initialize clients
    let catalog = HttpCatalogClient::new(&config.catalog)?;
    info!(base_url = %config.catalog.base_url, "Catalog client initialized");

    let datadog = DatadogClient::new(
        &config.datadog.integration,
        config.datadog.http.clone(),
        config.datadog.retry.clone(),
    )?;
    info!(base_url = %datadog.base_url(), "Datadog client initialized");

    let events = Arc::new(InMemoryEventBus::new());
    let clients = Clients {
        catalog: Arc::new(catalog),
        registry: Arc::new(datadog),
        auth: Arc::new(StaticTokenAuth::new(config.catalog.token.clone())),
        events: events.clone(),
    };

    // Register sync jobs
    let registry = define_builtin_syncs(SyncRegistryBuilder::new(), &config, metrics)
        .build(&clients);
    if registry.is_empty() {
        info!("No sync jobs configured");
    }

    // Create application state
    let state = AppState {
        registry: Arc::new(registry),
        events,
    };

    // Bind the HTTP server; syncs are scheduled while it runs
    let server = Server::bind(&config.server, state).await?;
    let result = server.run(shutdown_signal()).await;

    // Shutdown OpenTelemetry
    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("datadog-entity-sync shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

//! # SiteScore Server
//!
//! Standalone HTTP server for the aggregation engine.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration (config/sitescore.toml if present)
//! cargo run --bin sitescore-server
//!
//! # Explicit config file and bind address, Redis cache tier compiled in
//! cargo run --bin sitescore-server --features cache-redis -- \
//!     --config config/production.toml --bind 0.0.0.0:9000
//!
//! # Check a configuration file and exit
//! cargo run --bin sitescore-server -- --config config/sitescore.toml --validate-only
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use sitescore_core::cache::ResponseCache;
use sitescore_core::config::ConfigLoader;
use sitescore_core::logging;
use sitescore_core::orchestration::{collectors_from_config, Orchestrator};
use sitescore_core::persistence::{PersistenceSink, SqlitePersistenceSink};
use sitescore_core::resilience::CircuitBreakerManager;
use sitescore_core::web::{create_app, AppState};

#[derive(Parser, Debug)]
#[command(name = "sitescore-server")]
#[command(about = "Serve the location analysis aggregation engine over HTTP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SITESCORE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    validate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_tracing();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.web.bind_address = bind;
    }
    config.validate().context("Invalid configuration")?;

    if cli.validate_only {
        info!(
            environment = %config.environment,
            collectors = config.collectors.len(),
            "Configuration is valid"
        );
        println!("Configuration is valid");
        return Ok(());
    }

    info!("Starting SiteScore server");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Environment: {}", config.environment);

    let collectors = collectors_from_config(&config).context("Failed to build collectors")?;
    if collectors.is_empty() {
        warn!("No collectors configured; every analysis will be unavailable");
    }

    let cache = Arc::new(ResponseCache::from_config_graceful(&config.cache).await);
    let circuit_breakers = Arc::new(CircuitBreakerManager::from_config(&config.circuit_breakers));

    let mut builder = Orchestrator::builder(config.clone())
        .collectors(collectors)
        .circuit_breakers(circuit_breakers)
        .cache(cache);

    if config.persistence.enabled {
        match SqlitePersistenceSink::connect(&config.persistence).await {
            Ok(sink) => {
                let sink: Arc<dyn PersistenceSink> = Arc::new(sink);
                builder = builder.persistence(sink);
            }
            Err(e) => {
                error!(error = %e, "Persistence unavailable, continuing without history");
            }
        }
    }

    let orchestrator = Arc::new(builder.build().context("Failed to build orchestrator")?);
    let app = create_app(AppState::new(&config, orchestrator));

    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.web.bind_address))?;

    info!("   Listening on {}", config.web.bind_address);
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("SiteScore server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

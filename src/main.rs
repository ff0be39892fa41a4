//! Tetsudou server
//!
//! Loads configuration, sets up logging, and serves metalink documents.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tetsudou::{MetalinkServer, MetalinkService, MetricsEndpoint, ServerConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "tetsudou.yaml";

#[derive(Parser)]
#[command(name = "tetsudou")]
#[command(about = "Dynamic metalink server for package repository mirrors", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Override the listen address from the configuration
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.listen_address = listen;
        config.validate().context("invalid --listen address")?;
    }

    info!("Configuration loaded");
    info!("  - Listen address: {}", config.listen_address);
    info!("  - Upstream: {}", config.upstream_base_url);
    info!("  - Catalog backend: {:?}", config.catalog.backend);
    info!("  - Max mirrors: {:?}", config.selection.max_mirrors);
    info!(
        "  - Response cache: enabled={}, ttl={}s",
        config.cache.enabled, config.cache.ttl_secs
    );

    let addr: SocketAddr = config
        .listen_address
        .parse()
        .context("invalid listen_address")?;
    let metrics_config = config.metrics_endpoint.clone();

    let service = Arc::new(MetalinkService::new(Arc::new(config))?);
    let _cache_cleanup = service.spawn_cache_cleanup();

    if let Some(metrics_config) = metrics_config.filter(|m| m.enabled) {
        let metrics_addr: SocketAddr = metrics_config
            .address
            .parse()
            .context("invalid metrics_endpoint.address")?;
        let endpoint = MetricsEndpoint::new(Arc::clone(service.metrics()), metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = endpoint.start().await {
                error!("Metrics endpoint stopped: {}", e);
            }
        });
    }

    let server = MetalinkServer::bind(service, addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tokio::select! {
        result = server.run() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

/// Read the config file; a missing file at the default path means defaults
fn load_config(path: &Path) -> Result<ServerConfig> {
    if !path.exists() && path.as_os_str() == DEFAULT_CONFIG {
        warn!("{} not found, using default configuration", DEFAULT_CONFIG);
        return Ok(ServerConfig::default());
    }

    info!("Loading configuration from: {}", path.display());
    ServerConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

//! Jenkins MCP Gateway - Main entry point
//!
//! Serves the Jenkins tool set over MCP on stdin/stdout. Logs go to stderr.

use anyhow::Result;
use clap::Parser;
use jenkins_mcp_gateway::cache::CacheManager;
use jenkins_mcp_gateway::connection::{ConnectionCache, HttpClientFactory};
use jenkins_mcp_gateway::metrics::{MetricsCollector, UpstreamMetrics};
use jenkins_mcp_gateway::{Config, JenkinsMcpServer, ToolDispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// How often expired cache entries are swept.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "jenkins-mcp-gateway", version, about)]
struct Cli {
    /// Load settings from this env file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    };

    // Initialize logging (stderr only to avoid polluting stdout/MCP communication)
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        let level = config
            .as_ref()
            .map(|c| c.log_level.clone())
            .unwrap_or_else(|_| "error".to_string());
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match config {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        url = %config.jenkins_url,
        user = %config.username,
        auth = config.auth_method(),
        "Starting Jenkins MCP Gateway"
    );

    let upstream = UpstreamMetrics::new();
    let factory = HttpClientFactory::new(config.clone(), upstream.clone());
    let connection = Arc::new(ConnectionCache::new(Arc::new(factory)));
    let cache = CacheManager::new();
    let metrics = MetricsCollector::new(config.metrics_history);

    let sweeper_cache = cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper_cache.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "Swept expired cache entries");
            }
        }
    });

    let dispatcher = ToolDispatcher::new(connection, cache, Arc::new(config), metrics, upstream);
    let server = JenkinsMcpServer::new(Arc::new(dispatcher));

    // Run the server (this will block until the server exits)
    info!("Starting MCP server with stdio transport");
    jenkins_mcp_gateway::server::run_server(server).await?;

    info!("Jenkins MCP Gateway shutdown complete");
    Ok(())
}

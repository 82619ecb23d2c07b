use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

use uilet_calendar::adapters::backend::client::BackendClient;
use uilet_calendar::adapters::cache::memory_cache::MemoryCache;
use uilet_calendar::config::load_config;
use uilet_calendar::mcp::server::CalendarMcpServer;
use uilet_calendar::ports::availability_store::AvailabilityStore;
use uilet_calendar::ports::cache::SnapshotCache;

fn find_config_path() -> PathBuf {
    let candidates = [
        PathBuf::from("config.yaml"),
        binary_dir().join("config.yaml"),
    ];

    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    candidates[0].clone()
}

fn binary_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting uilet-calendar server");

    let config_path = find_config_path();
    let mut config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.apply_overrides(|key| std::env::var(key).ok());

    tracing::info!(
        backend = %config.backend.base_url,
        authenticated = config.backend.api_token.is_some(),
        read_only = config.calendar.read_only,
        "Configuration loaded"
    );

    let cache: Arc<dyn SnapshotCache> = Arc::new(MemoryCache::new(config.cache.max_entries));
    let store: Arc<dyn AvailabilityStore> = Arc::new(
        BackendClient::new(config.backend, &config.cache, cache)
            .context("building backend HTTP client")?,
    );

    let server = CalendarMcpServer::new(store, config.calendar);

    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}

//! shellcache server entry point.
//!
//! Boots the MCP server on stdio transport after registering the configured
//! generation. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchClient, FetchConfig};
use shellcache_core::{AppConfig, CacheDb, Registration};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;

    tracing::info!(
        generation = %config.generation,
        origin = %origin,
        db_path = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let client = FetchClient::new(FetchConfig::from_app(&config)?)?;
    let registration = Registration::new(Arc::new(db), Arc::new(client));

    // Without an active generation, fetches go straight to the network.
    match registration.register(config.settings()?).await {
        Ok(report) => tracing::info!(generation = %report.generation, cached = report.install.cached, "generation active"),
        Err(err) => tracing::error!(generation = %config.generation, error = %err, "initial registration failed"),
    }

    let handler = handler::ShellCacheServer::new(Arc::new(handler::AppState { registration, origin }));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use mapbook_api::{app, config, middleware, services};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::metrics::init_metrics().map_err(anyhow::Error::msg)?;

    info!("Starting Mapbook API v{}", env!("CARGO_PKG_VERSION"));

    // In-process document store; a remote-backed implementation plugs in
    // here without touching the rest of the app.
    let store = Arc::new(store::MemoryStore::new());
    let identity = Arc::new(services::StaticIdentityProvider::new());

    let addr = config.socket_addr()?;
    let app = app::create_app(config, store, identity);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

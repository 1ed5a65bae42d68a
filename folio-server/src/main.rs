//! Folio server
//!
//! Serves short links (`/{slug}` → `307` to the stored url) and read-only
//! listings of the synced collections, backed by an in-memory store seeded
//! from a JSON file.
//!
//! Usage:
//!   folio-server --port 8080 --seed seed.json

use anyhow::{Context, Result};
use clap::Parser;
use folio_server::{AppState, ServerArgs, build_router, connect};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Folio server starting...");
    let connection = connect(args.seed.as_deref()).await;
    info!(?connection, "backing store ready");

    let state = AppState::new(connection, &args.sync_config());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind HTTP port {}", args.port))?;
    info!(port = args.port, "HTTP endpoint listening");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

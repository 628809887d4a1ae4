// ABOUTME: Server binary for the Embers streak engine
// ABOUTME: Wires config, logging, database, and resources, then serves the streak API
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! # Embers Server Binary
//!
//! Starts the streak-tracking REST API. Configuration is environment-only;
//! the CLI accepts a port override for local runs.

use anyhow::Result;
use clap::Parser;
use embers::{
    config::ServerConfig, database::Database, logging, resources::EngineResources,
    routes::StreakRoutes,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Parser)]
#[command(name = "embers-server")]
#[command(about = "Embers - streak and goal-history tracking API")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    info!("Starting Embers streak engine");
    info!("{}", config.summary());

    let database = Database::new(&config.database_url).await?;
    info!("Database initialized: {}", config.database_url);

    let port = config.http_port;
    let resources = Arc::new(EngineResources::new(database, Arc::new(config)));

    let app = StreakRoutes::routes(resources).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on port {port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Embers shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {e}");
    }
}

// ABOUTME: Server binary: loads configuration, opens the database, runs the HTTP server
// ABOUTME: Command-line overrides for port and database URL on top of environment config
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Moorgate Server Binary
//!
//! Starts the multi-tenant OAuth credential and session resolution
//! engine: environment-driven configuration, encrypted SQLite storage,
//! and the axum HTTP surface.

use anyhow::Result;
use clap::Parser;
use moorgate::{
    config::{DatabaseUrl, ServerConfig},
    database::Database,
    logging,
    server::{AppState, MoorgateServer},
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "moorgate-server")]
#[command(about = "Moorgate - multi-tenant OAuth credential and session resolution engine")]
pub struct Args {
    /// Override HTTP listen port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle container environments where clap may not work properly
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Argument parsing failed: {e}");
            eprintln!("Using environment configuration only");
            Args {
                http_port: None,
                database_url: None,
            }
        }
    };

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(url) = args.database_url.as_deref() {
        config.database.url = DatabaseUrl::parse_url(url);
    }

    logging::init_from_env()?;

    info!("Starting Moorgate");
    info!("{}", config.summary());

    let database = Database::new(
        &config.database.url.to_connection_string(),
        config.database.encryption_key.as_bytes().to_vec(),
    )
    .await?;
    info!("Database ready: {}", config.database.url);

    let state = AppState::from_config(Arc::new(config), database);
    let server = MoorgateServer::new(state);

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return Err(e);
    }
    Ok(())
}

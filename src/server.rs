// ABOUTME: Server assembly: shared state, router construction, and the serve loop
// ABOUTME: Wires config, database, connector, stores, flow, resolver, and gate into one axum app
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Server Assembly
//!
//! [`AppState`] owns one instance of every engine component and is the
//! single state type every route and middleware extracts. All fields are
//! cheap to clone (`Arc`s and pooled handles), so the state itself is
//! `Clone` rather than wrapped in another `Arc`.
//!
//! The router splits into a public surface (install flow, pages, health)
//! and a gated surface (`/api`, debug) behind the access gate middleware.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::header::HeaderValue;
use axum::http::Method;
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::SessionCodec;
use crate::config::ServerConfig;
use crate::constants::http_server;
use crate::credentials::CredentialStore;
use crate::database::Database;
use crate::gate::{access_gate_middleware, AccessGate};
use crate::oauth::{FlowController, HttpPlatformConnector, InstallSessionStore, PlatformConnector};
use crate::resolver::CredentialResolver;
use crate::routes::{DebugRoutes, HealthRoutes, OAuthRoutes, PagesRoutes, TenantRoutes};

/// Shared state behind every route and middleware
#[derive(Clone)]
pub struct AppState {
    /// Environment-derived configuration
    pub config: Arc<ServerConfig>,
    /// SQLite-backed storage with at-rest encryption
    pub database: Database,
    /// Credential store (freshness, refresh, umbrella minting)
    pub credentials: CredentialStore,
    /// Query/header/session tenant resolution
    pub resolver: CredentialResolver,
    /// Install flow orchestration
    pub flow: FlowController,
    /// Request authentication strategies
    pub gate: Arc<AccessGate>,
    /// Session token mint and verify
    pub codec: SessionCodec,
    /// Pending installs keyed by state
    pub sessions: InstallSessionStore,
}

impl AppState {
    /// Wire every component from configuration, an open database, and a
    /// platform connector
    ///
    /// The connector is injected so callers can swap the HTTP
    /// implementation for a scripted one; [`Self::from_config`] builds
    /// the production wiring.
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Database,
        connector: Arc<dyn PlatformConnector>,
    ) -> Self {
        let codec = SessionCodec::new(config.session.secret.as_bytes(), config.session.ttl_hours);
        let sessions = InstallSessionStore::new();
        let credentials = CredentialStore::new(database.clone(), Arc::clone(&connector));
        let resolver = CredentialResolver::new(credentials.clone(), codec.clone());
        let flow = FlowController::new(
            Arc::clone(&config),
            sessions.clone(),
            credentials.clone(),
            connector,
            codec.clone(),
        );
        let gate = Arc::new(AccessGate::new(&config, codec.clone()));

        Self {
            config,
            database,
            credentials,
            resolver,
            flow,
            gate,
            codec,
            sessions,
        }
    }

    /// Production wiring: an outbound HTTP connector built from the
    /// platform configuration
    #[must_use]
    pub fn from_config(config: Arc<ServerConfig>, database: Database) -> Self {
        let connector: Arc<dyn PlatformConnector> =
            Arc::new(HttpPlatformConnector::new(config.platform.clone()));
        Self::new(config, database, connector)
    }
}

/// The Moorgate HTTP server
pub struct MoorgateServer {
    state: AppState,
}

impl MoorgateServer {
    /// Create a server from pre-built state
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the full application router
    #[must_use]
    pub fn router(&self) -> Router {
        let state = &self.state;

        let public = Router::new()
            .merge(OAuthRoutes::routes(state.clone()))
            .merge(PagesRoutes::routes(state.clone()))
            .merge(HealthRoutes::routes(state.clone()));

        let gated = Router::new()
            .merge(TenantRoutes::routes(state.clone()))
            .merge(DebugRoutes::routes(state.clone()))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                access_gate_middleware,
            ));

        public
            .merge(gated)
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_secs(
                http_server::REQUEST_TIMEOUT_SECS,
            )))
            .layer(cors_layer(state.config.platform.ui_host.as_deref()))
    }

    /// Bind and serve until SIGINT/SIGTERM
    ///
    /// # Errors
    /// Returns an error if the listen port cannot be bound or the accept
    /// loop fails
    pub async fn run(self) -> Result<()> {
        let port = self.state.config.http_port;
        self.log_startup();

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("Failed to bind port {port}"))?;
        info!("HTTP server listening on http://0.0.0.0:{port}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server terminated abnormally")?;

        info!("Server shutdown complete");
        Ok(())
    }

    fn log_startup(&self) {
        let config = &self.state.config;
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %config.environment,
            port = config.http_port,
            database = %config.database.url,
            "Starting moorgate"
        );
        if config.platform.client_id.is_none() {
            warn!("PLATFORM_CLIENT_ID is not set; installs will fail with config_missing");
        }
        if config.gate.operator_password_hash.is_none() {
            info!("Operator authenticator disabled (no OPERATOR_PASSWORD_HASH)");
        }
        if config.expose_token_debug {
            warn!("EXPOSE_TOKEN_DEBUG is enabled; credential previews are reachable through the gate");
        }
    }
}

/// CORS restricted to the platform UI origin, when one is configured
///
/// Without a configured UI host no cross-origin access is granted at
/// all, which is the right default for a credential service.
fn cors_layer(ui_host: Option<&str>) -> CorsLayer {
    let Some(host) = ui_host else {
        return CorsLayer::new();
    };
    let origin = format!("https://{host}");
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST])
            .allow_credentials(true),
        Err(_) => {
            warn!(ui_host = host, "PLATFORM_UI_HOST is not a valid origin; CORS disabled");
            CorsLayer::new()
        }
    }
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

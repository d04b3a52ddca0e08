// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides common database, config, state, and scripted connector helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
//! Shared test utilities for `moorgate`
//!
//! This module provides common test setup functions to reduce duplication
//! across integration tests.

use anyhow::Result;
use chrono::{Duration, Utc};
use moorgate::{
    config::{
        DatabaseConfig, DatabaseUrl, Environment, GateConfig, PlatformConfig, SecretBytes,
        ServerConfig, SessionConfig,
    },
    database::{generate_encryption_key, Database},
    errors::{AppError, AppResult},
    models::{TenantCredential, UmbrellaCredential},
    oauth::{PlatformConnector, TokenGrant},
    server::AppState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        // Check for TEST_LOG environment variable to control test logging level
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard in-memory test database, migrated and ready
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    let database = Database::new("sqlite::memory:", generate_encryption_key().to_vec()).await?;
    database.migrate().await?;
    Ok(database)
}

/// Fully configured `ServerConfig` pointing at example platform endpoints
pub fn create_test_config() -> ServerConfig {
    ServerConfig {
        http_port: 8080,
        base_url: Some("https://connector.example".to_owned()),
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
            encryption_key: SecretBytes::new(generate_encryption_key().to_vec()),
        },
        session: SessionConfig {
            secret: SecretBytes::new(b"moorgate-test-session-secret-64-bytes-long-padding-0123456789ab".to_vec()),
            ttl_hours: 24,
        },
        platform: PlatformConfig {
            client_id: Some("client_abc123".to_owned()),
            client_secret: Some("secret_xyz789".to_owned()),
            authorize_url: Some("https://marketplace.example/oauth/chooselocation".to_owned()),
            token_url: Some("https://services.example/oauth/token".to_owned()),
            tenant_token_url: Some("https://services.example/oauth/locationToken".to_owned()),
            scopes: vec!["contacts.readonly".to_owned(), "locations.readonly".to_owned()],
            redirect_base: Some("https://connector.example".to_owned()),
            ui_host: Some("app.platform.example".to_owned()),
        },
        gate: GateConfig {
            operator_username: "admin".to_owned(),
            operator_password_hash: None,
        },
        landing_path: "/connected".to_owned(),
        expose_token_debug: false,
    }
}

/// Build an [`AppState`] over a fresh in-memory database and the given
/// connector
pub async fn create_test_state(
    config: ServerConfig,
    connector: Arc<dyn PlatformConnector>,
) -> Result<AppState> {
    let database = create_test_database().await?;
    Ok(AppState::new(Arc::new(config), database, connector))
}

/// Scripted platform connector with per-method call counters
///
/// Each method returns a clone of its configured grant, or an
/// `exchange_failed` error when none was configured.
#[derive(Default)]
pub struct StubConnector {
    exchange_grant: Option<TokenGrant>,
    refresh_grant: Option<TokenGrant>,
    mint_grant: Option<TokenGrant>,
    /// Number of `exchange_code` calls
    pub exchange_calls: AtomicUsize,
    /// Number of `refresh_token` calls
    pub refresh_calls: AtomicUsize,
    /// Number of `mint_tenant_token` calls
    pub mint_calls: AtomicUsize,
    /// Codes passed to `exchange_code`, in order
    pub seen_codes: Mutex<Vec<String>>,
    /// `(umbrella_access_token, umbrella_id, tenant_id)` triples passed to
    /// `mint_tenant_token`, in order
    pub seen_mints: Mutex<Vec<(String, String, String)>>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the grant `exchange_code` returns
    pub fn with_exchange(mut self, grant: TokenGrant) -> Self {
        self.exchange_grant = Some(grant);
        self
    }

    /// Script the grant `refresh_token` returns
    pub fn with_refresh(mut self, grant: TokenGrant) -> Self {
        self.refresh_grant = Some(grant);
        self
    }

    /// Script the grant `mint_tenant_token` returns
    pub fn with_mint(mut self, grant: TokenGrant) -> Self {
        self.mint_grant = Some(grant);
        self
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn mint_count(&self) -> usize {
        self.mint_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlatformConnector for StubConnector {
    async fn exchange_code(&self, code: &str) -> AppResult<TokenGrant> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_codes.lock().unwrap().push(code.to_owned());
        self.exchange_grant
            .clone()
            .ok_or_else(|| AppError::exchange_failed("stub connector has no exchange grant"))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> AppResult<TokenGrant> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_grant
            .clone()
            .ok_or_else(|| AppError::exchange_failed("stub connector rejected the refresh"))
    }

    async fn mint_tenant_token(
        &self,
        umbrella_access_token: &str,
        umbrella_id: &str,
        tenant_id: &str,
    ) -> AppResult<TokenGrant> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_mints.lock().unwrap().push((
            umbrella_access_token.to_owned(),
            umbrella_id.to_owned(),
            tenant_id.to_owned(),
        ));
        self.mint_grant
            .clone()
            .ok_or_else(|| AppError::exchange_failed("stub connector has no mint grant"))
    }
}

/// A tenant-level grant naming `location_id`, valid for eight hours
pub fn tenant_grant(access_token: &str, location_id: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_owned(),
        refresh_token: format!("{access_token}_refresh"),
        expires_at: Utc::now() + Duration::hours(8),
        user_type: Some("Location".to_owned()),
        company_id: None,
        location_id: Some(location_id.to_owned()),
    }
}

/// An umbrella-level grant (`userType: Company`) naming both ids
pub fn umbrella_grant(access_token: &str, company_id: &str, location_id: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_owned(),
        refresh_token: format!("{access_token}_refresh"),
        expires_at: Utc::now() + Duration::hours(8),
        user_type: Some("Company".to_owned()),
        company_id: Some(company_id.to_owned()),
        location_id: Some(location_id.to_owned()),
    }
}

/// A grant naming no account level or ids at all
pub fn bare_grant(access_token: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_owned(),
        refresh_token: format!("{access_token}_refresh"),
        expires_at: Utc::now() + Duration::hours(8),
        user_type: None,
        company_id: None,
        location_id: None,
    }
}

/// Store a tenant credential expiring `expires_in_secs` from now
/// (negative values store an already expired one)
pub async fn seed_tenant_credential(
    database: &Database,
    tenant_id: &str,
    access_token: &str,
    expires_in_secs: i64,
) -> Result<()> {
    let credential = TenantCredential {
        tenant_id: tenant_id.to_owned(),
        access_token: access_token.to_owned(),
        refresh_token: format!("{access_token}_refresh"),
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        obtained_at: Utc::now(),
    };
    database.upsert_tenant_credential(&credential).await?;
    Ok(())
}

/// Store an umbrella credential expiring `expires_in_secs` from now
pub async fn seed_umbrella_credential(
    database: &Database,
    umbrella_id: &str,
    access_token: &str,
    expires_in_secs: i64,
) -> Result<()> {
    let credential = UmbrellaCredential {
        umbrella_id: umbrella_id.to_owned(),
        access_token: access_token.to_owned(),
        refresh_token: format!("{access_token}_refresh"),
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
    };
    database.upsert_umbrella_credential(&credential).await?;
    Ok(())
}

/// Extract the value of a named cookie from a `Set-Cookie` string
pub fn cookie_value_of(set_cookie: &str, name: &str) -> Option<String> {
    let rest = set_cookie.strip_prefix(name)?.strip_prefix('=')?;
    Some(rest.split(';').next().unwrap_or(rest).to_owned())
}

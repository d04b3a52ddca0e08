// ABOUTME: OAuth module organizing the install flow, platform connector, and state store
// ABOUTME: Defines the token grant shape shared by code exchange, refresh, and tenant minting
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OAuth Management Module
//!
//! Everything between "a tenant clicked connect" and "a credential is on
//! disk" lives here: the single-use install session store, the connector
//! that talks to the platform's token endpoints, and the flow controller
//! that orchestrates the redirect dance.

pub mod connector;
pub mod flow;
pub mod install_session;

pub use connector::HttpPlatformConnector;
pub use flow::{AuthorizeOutcome, AuthorizeRequest, CallbackOutcome, CallbackQuery, FlowController};
pub use install_session::{InstallSession, InstallSessionStore};

use chrono::{DateTime, Utc};

use crate::errors::AppResult;

/// User type reported by the platform for umbrella-scoped grants
pub const UMBRELLA_USER_TYPE: &str = "Company";

/// Tokens returned by the platform, normalized to an absolute expiry
#[derive(Clone)]
pub struct TokenGrant {
    /// Bearer token for platform API calls
    pub access_token: String,
    /// Token used to obtain a replacement grant
    pub refresh_token: String,
    /// Absolute expiry, computed from `expires_in` at receipt
    pub expires_at: DateTime<Utc>,
    /// Account level the platform reported for the grant, when present
    pub user_type: Option<String>,
    /// Umbrella the grant belongs to, when the platform reports one
    pub company_id: Option<String>,
    /// Tenant the grant belongs to, when the platform reports one
    pub location_id: Option<String>,
}

impl TokenGrant {
    /// Whether the platform issued this grant at the umbrella (agency) level
    #[must_use]
    pub fn is_umbrella(&self) -> bool {
        self.user_type.as_deref() == Some(UMBRELLA_USER_TYPE)
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user_type", &self.user_type)
            .field("company_id", &self.company_id)
            .field("location_id", &self.location_id)
            .finish()
    }
}

/// Client for the platform's token endpoints
///
/// The flow controller and credential store talk to the platform only
/// through this trait, so tests can swap in a scripted implementation and
/// alternative platforms need nothing beyond a new connector.
#[async_trait::async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Exchange an authorization code for a token grant
    async fn exchange_code(&self, code: &str) -> AppResult<TokenGrant>;

    /// Trade a refresh token for a replacement grant
    async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenGrant>;

    /// Mint a tenant-scoped grant from an umbrella access token
    async fn mint_tenant_token(
        &self,
        umbrella_access_token: &str,
        umbrella_id: &str,
        tenant_id: &str,
    ) -> AppResult<TokenGrant>;
}

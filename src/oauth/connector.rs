// ABOUTME: HTTP connector for the platform's code exchange, refresh, and tenant-token endpoints
// ABOUTME: Normalizes wire responses into token grants with an absolute expiry
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! The single concrete [`PlatformConnector`]. Endpoint URLs and client
//! credentials come from configuration; a missing value surfaces as a
//! `CONFIG_MISSING` error at call time rather than at startup, so a
//! half-configured deployment still boots and reports what it lacks.

use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{PlatformConnector, TokenGrant};
use crate::config::PlatformConfig;
use crate::errors::{AppError, AppResult};
use crate::utils::http_client;

/// Longest error-body excerpt carried into an error message
const ERROR_BODY_EXCERPT_CHARS: usize = 200;

/// Wire shape of the platform's token responses
///
/// The platform mixes snake_case OAuth fields with camelCase extensions,
/// and calls umbrellas companies and tenants locations.
#[derive(Debug, Deserialize)]
struct PlatformTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(rename = "userType")]
    user_type: Option<String>,
    #[serde(rename = "companyId")]
    company_id: Option<String>,
    #[serde(rename = "locationId")]
    location_id: Option<String>,
}

impl PlatformTokenResponse {
    fn into_grant(self) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            user_type: self.user_type,
            company_id: self.company_id,
            location_id: self.location_id,
        }
    }
}

/// Connector backed by the real platform endpoints
pub struct HttpPlatformConnector {
    config: PlatformConfig,
}

impl HttpPlatformConnector {
    /// Build a connector over the configured platform endpoints
    #[must_use]
    pub const fn new(config: PlatformConfig) -> Self {
        Self { config }
    }

    fn client_credentials(&self) -> AppResult<(&str, &str)> {
        let client_id = require_config(self.config.client_id.as_deref(), "PLATFORM_CLIENT_ID")?;
        let client_secret =
            require_config(self.config.client_secret.as_deref(), "PLATFORM_CLIENT_SECRET")?;
        Ok((client_id, client_secret))
    }

    async fn post_token_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> AppResult<TokenGrant> {
        let mut request = http_client::shared_client().post(url).form(params);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::exchange_failed(format!("Token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::exchange_failed(format!("Failed to read token response: {e}"))
        })?;

        if !status.is_success() {
            return Err(AppError::exchange_failed(format!(
                "Token endpoint returned {status}: {}",
                excerpt(&body)
            )));
        }

        let parsed: PlatformTokenResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::exchange_failed(format!("Malformed token response: {e}")))?;

        Ok(parsed.into_grant())
    }
}

#[async_trait::async_trait]
impl PlatformConnector for HttpPlatformConnector {
    async fn exchange_code(&self, code: &str) -> AppResult<TokenGrant> {
        let token_url = require_config(self.config.token_url.as_deref(), "PLATFORM_TOKEN_URL")?;
        let (client_id, client_secret) = self.client_credentials()?;

        let redirect_uri = self.config.redirect_uri();
        let mut params = vec![
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
            ("code", code),
        ];
        // Some platform configurations validate the redirect on exchange
        if let Some(uri) = redirect_uri.as_deref() {
            params.push(("redirect_uri", uri));
        }

        tracing::debug!("Exchanging authorization code for tokens");
        self.post_token_form(token_url, &params, None).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> AppResult<TokenGrant> {
        let token_url = require_config(self.config.token_url.as_deref(), "PLATFORM_TOKEN_URL")?;
        let (client_id, client_secret) = self.client_credentials()?;

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        tracing::debug!("Refreshing platform token");
        self.post_token_form(token_url, &params, None).await
    }

    async fn mint_tenant_token(
        &self,
        umbrella_access_token: &str,
        umbrella_id: &str,
        tenant_id: &str,
    ) -> AppResult<TokenGrant> {
        let mint_url = require_config(
            self.config.tenant_token_url.as_deref(),
            "PLATFORM_TENANT_TOKEN_URL",
        )?;

        // Wire names follow the platform: companyId is the umbrella,
        // locationId is the tenant
        let params = [("companyId", umbrella_id), ("locationId", tenant_id)];

        tracing::debug!(tenant_id, umbrella_id, "Minting tenant-scoped token");
        self.post_token_form(mint_url, &params, Some(umbrella_access_token))
            .await
    }
}

fn require_config<'a>(value: Option<&'a str>, name: &str) -> AppResult<&'a str> {
    value.ok_or_else(|| AppError::config_missing(format!("{name} is not set")))
}

/// Trim a response body for inclusion in an error message
fn excerpt(body: &str) -> String {
    let mut out: String = body.chars().take(ERROR_BODY_EXCERPT_CHARS).collect();
    if out.len() < body.len() {
        out.push_str("...");
    }
    out
}

// ABOUTME: OAuth flow controller orchestrating the authorize redirect and the callback
// ABOUTME: Every callback path lands on the landing page with a machine-readable outcome
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OAuth Flow Controller
//!
//! Two halves of the install dance. Authorize records an install session,
//! stages fallback cookies, and sends the browser to the platform.
//! Callback recovers the tenant, exchanges the code, persists what came
//! back, mints a browser session, and redirects to the landing page.
//!
//! The callback never renders an error page: success and every failure
//! mode alike end in a redirect to the fixed landing path, with the
//! outcome encoded in query parameters the landing page can read.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{InstallSessionStore, PlatformConnector};
use crate::auth::SessionCodec;
use crate::config::ServerConfig;
use crate::constants::{cookies as cookie_names, defaults, landing};
use crate::credentials::CredentialStore;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::utils::cookies;

/// Query parameters accepted by the authorize endpoint
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Tenant starting the install
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
    /// Umbrella the tenant claims to belong to
    #[serde(rename = "umbrellaId")]
    pub umbrella_id: Option<String>,
    /// In-app path to return the user to after the install
    #[serde(rename = "returnPath")]
    pub return_path: Option<String>,
}

/// Query parameters the platform sends to the callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange
    pub code: Option<String>,
    /// State minted at authorize
    pub state: Option<String>,
    /// Error code, when the platform aborted the flow
    pub error: Option<String>,
    /// Human-readable error detail from the platform
    pub error_description: Option<String>,
}

/// Result of a successful authorize call
#[derive(Debug)]
pub struct AuthorizeOutcome {
    /// Platform URL to redirect the browser to
    pub authorize_url: String,
    /// Cookies staging install context for the callback
    pub cookies: Vec<String>,
}

/// Result of a callback, success or not
#[derive(Debug)]
pub struct CallbackOutcome {
    /// Landing URL carrying the outcome query parameters
    pub location: String,
    /// Cookies to set: install-context clears always, plus the session on success
    pub cookies: Vec<String>,
}

struct CompletedInstall {
    tenant_id: String,
    session_token: String,
    return_path: Option<String>,
}

/// Orchestrates the install flow end to end
#[derive(Clone)]
pub struct FlowController {
    config: Arc<ServerConfig>,
    sessions: InstallSessionStore,
    credentials: CredentialStore,
    connector: Arc<dyn PlatformConnector>,
    codec: SessionCodec,
}

impl FlowController {
    /// Wire the controller to its collaborators
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        sessions: InstallSessionStore,
        credentials: CredentialStore,
        connector: Arc<dyn PlatformConnector>,
        codec: SessionCodec,
    ) -> Self {
        Self {
            config,
            sessions,
            credentials,
            connector,
            codec,
        }
    }

    /// Start an install: record the session, stage cookies, build the
    /// platform authorize URL
    ///
    /// The tenant id is optional. Marketplace-initiated installs arrive
    /// without one; the callback then has to recover the tenant from the
    /// grant itself or fail.
    ///
    /// # Errors
    /// Returns `CONFIG_MISSING` when the platform endpoints are not configured
    #[tracing::instrument(
        skip(self, request),
        fields(tenant_id = request.tenant_id.as_deref().unwrap_or("<none>"))
    )]
    pub async fn begin_authorize(&self, request: &AuthorizeRequest) -> AppResult<AuthorizeOutcome> {
        let platform = &self.config.platform;
        let authorize_endpoint = platform
            .authorize_url
            .as_deref()
            .ok_or_else(|| AppError::config_missing("PLATFORM_AUTHORIZE_URL is not set"))?;
        let client_id = platform
            .client_id
            .as_deref()
            .ok_or_else(|| AppError::config_missing("PLATFORM_CLIENT_ID is not set"))?;
        let redirect_uri = platform.redirect_uri().ok_or_else(|| {
            AppError::config_missing("PLATFORM_REDIRECT_BASE or BASE_URL is not set")
        })?;

        let tenant_id = request.tenant_id.as_deref().filter(|t| !t.is_empty());
        let mut cookies = Vec::new();
        let state = if let Some(tenant_id) = tenant_id {
            let state = self
                .sessions
                .put(tenant_id, request.umbrella_id.as_deref())
                .await;

            // Fallback cookies carry the same context as the install
            // session, for platforms that drop the state on the way back
            cookies.push(cookies::install_cookie(
                cookie_names::INSTALL_TENANT,
                tenant_id,
            ));
            if let Some(umbrella_id) = request.umbrella_id.as_deref() {
                cookies.push(cookies::install_cookie(
                    cookie_names::INSTALL_UMBRELLA,
                    umbrella_id,
                ));
            }
            if let Some(return_path) =
                request.return_path.as_deref().and_then(sanitize_return_path)
            {
                cookies.push(cookies::install_cookie(
                    cookie_names::INSTALL_RETURN,
                    return_path,
                ));
            }
            state
        } else {
            // No tenant to stage, but the round trip still gets a state
            uuid::Uuid::new_v4().to_string()
        };

        let authorize_url = format!(
            "{authorize_endpoint}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            urlencoding::encode(client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&platform.scope_string()),
            urlencoding::encode(&state)
        );

        info!(tenant_id = tenant_id.unwrap_or("<none>"), "Install flow started");
        Ok(AuthorizeOutcome {
            authorize_url,
            cookies,
        })
    }

    /// Complete (or fail) an install; the outcome is always a landing redirect
    #[tracing::instrument(
        skip(self, query, headers),
        fields(has_code = query.code.is_some(), has_error = query.error.is_some())
    )]
    pub async fn handle_callback(
        &self,
        query: &CallbackQuery,
        headers: &HeaderMap,
    ) -> CallbackOutcome {
        // Install cookies are single-use like the state
        let mut cookies = vec![
            cookies::clear_cookie(cookie_names::INSTALL_TENANT),
            cookies::clear_cookie(cookie_names::INSTALL_UMBRELLA),
            cookies::clear_cookie(cookie_names::INSTALL_RETURN),
        ];

        if let Some(provider_error) = query.error.as_deref() {
            warn!(provider_error, "Platform reported an authorization error");
            let description = query
                .error_description
                .as_deref()
                .unwrap_or("The platform reported an error during authorization");
            return CallbackOutcome {
                location: self.landing_error(provider_error, description),
                cookies,
            };
        }

        match self.complete_install(query, headers).await {
            Ok(install) => {
                cookies.push(cookies::session_cookie(
                    &install.session_token,
                    self.codec.ttl().num_seconds(),
                ));
                CallbackOutcome {
                    location: self
                        .landing_success(&install.tenant_id, install.return_path.as_deref()),
                    cookies,
                }
            }
            Err(e) => {
                if e.code == ErrorCode::StorageFailed {
                    // The platform holds a grant we failed to keep; retrying
                    // the flow will not fix the storage underneath
                    error!(error = %e, "Install accepted by the platform but persistence failed");
                } else {
                    warn!(error = %e, "Install flow failed");
                }
                CallbackOutcome {
                    location: self.landing_error(e.code.landing_code(), &e.message),
                    cookies,
                }
            }
        }
    }

    async fn complete_install(
        &self,
        query: &CallbackQuery,
        headers: &HeaderMap,
    ) -> AppResult<CompletedInstall> {
        // Recover tenant context before touching the platform: a callback
        // that cannot name its tenant must not burn the code
        let session = match query.state.as_deref() {
            Some(state) => self.sessions.take(state).await,
            None => None,
        };

        let (recovered_tenant, recovered_umbrella) = if let Some(session) = session {
            (Some(session.tenant_id), session.umbrella_id)
        } else {
            (
                cookies::cookie_value(headers, cookie_names::INSTALL_TENANT).map(str::to_owned),
                cookies::cookie_value(headers, cookie_names::INSTALL_UMBRELLA).map(str::to_owned),
            )
        };

        let recovered_tenant = recovered_tenant.ok_or_else(|| {
            AppError::missing_tenant_context(
                "No install session or fallback cookie identifies the tenant",
            )
        })?;

        let code = query
            .code
            .as_deref()
            .ok_or_else(|| AppError::exchange_failed("Callback carried neither code nor error"))?;

        let grant = self.connector.exchange_code(code).await?;

        // A grant that names its tenant outranks what we recovered
        let tenant_id = grant.location_id.clone().unwrap_or(recovered_tenant);

        self.credentials
            .persist_tenant_grant(&tenant_id, &grant)
            .await?;

        if grant.is_umbrella() {
            let umbrella_id = grant
                .company_id
                .clone()
                .or(recovered_umbrella)
                .unwrap_or_else(|| defaults::UMBRELLA_ID.to_owned());
            self.credentials
                .persist_umbrella_grant(&umbrella_id, &grant)
                .await?;
            info!(tenant_id, umbrella_id, "Umbrella credential captured from install");
        }

        let session_token = self.codec.mint(&tenant_id)?;

        let return_path = cookies::cookie_value(headers, cookie_names::INSTALL_RETURN)
            .and_then(sanitize_return_path)
            .map(str::to_owned);

        info!(tenant_id, "Install completed");
        Ok(CompletedInstall {
            tenant_id,
            session_token,
            return_path,
        })
    }

    fn landing_success(&self, tenant_id: &str, return_path: Option<&str>) -> String {
        let mut location = format!(
            "{}?{}=1&{}={}",
            self.config.landing_path,
            landing::SUCCESS,
            landing::TENANT_ID,
            urlencoding::encode(tenant_id)
        );
        if let Some(path) = return_path {
            location.push_str(&format!(
                "&{}={}",
                landing::RETURN,
                urlencoding::encode(path)
            ));
        }
        location
    }

    fn landing_error(&self, code: &str, description: &str) -> String {
        format!(
            "{}?{}={}&{}={}",
            self.config.landing_path,
            landing::ERROR,
            urlencoding::encode(code),
            landing::ERROR_DESCRIPTION,
            urlencoding::encode(description)
        )
    }
}

/// Accept only same-origin absolute paths as post-install return targets
fn sanitize_return_path(path: &str) -> Option<&str> {
    if path.starts_with('/') && !path.starts_with("//") {
        Some(path)
    } else {
        None
    }
}

// ABOUTME: Access gate guarding operator-facing surfaces with pluggable authenticators
// ABOUTME: Page requests are redirected toward login or the install flow, API requests get 401
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Access Gate
//!
//! Tower middleware in front of everything that is not part of the public
//! install surface. Authentication strategies are an ordered list behind
//! the [`Authenticator`] trait: the tenant session cookie first, then HTTP
//! Basic credentials for the operator. The first strategy that recognizes
//! the request wins; adding a new scheme means adding a strategy, not
//! editing the gate.
//!
//! Denied requests split by audience. API calls (an `/api/` path or a JSON
//! `Accept` header) receive a 401 body and are never redirected. Page
//! loads go to the login page, except when the request looks like it came
//! from inside the platform UI and names a tenant, in which case sending
//! the visitor through the install flow is the recovery that actually
//! helps.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::auth::SessionCodec;
use crate::config::ServerConfig;
use crate::constants::{cookies, params, routes};
use crate::errors::AppError;
use crate::server::AppState;
use crate::utils::cookies as cookie_utils;

/// Who passed the gate, and how
#[derive(Debug, Clone)]
pub struct GateIdentity {
    /// Tenant id for sessions, username for operators
    pub subject: String,
    /// Name of the strategy that authenticated the request
    pub method: &'static str,
}

/// One authentication strategy consulted by the gate
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Strategy name, recorded on the identity it produces
    fn name(&self) -> &'static str;

    /// Try to authenticate the request; `None` means "not mine, ask the next"
    async fn authenticate(&self, headers: &HeaderMap, uri: &Uri) -> Option<GateIdentity>;
}

/// Authenticates requests carrying a valid session cookie
pub struct SessionAuthenticator {
    codec: SessionCodec,
}

impl SessionAuthenticator {
    /// Build the strategy around the shared session codec
    #[must_use]
    pub const fn new(codec: SessionCodec) -> Self {
        Self { codec }
    }
}

#[async_trait::async_trait]
impl Authenticator for SessionAuthenticator {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn authenticate(&self, headers: &HeaderMap, _uri: &Uri) -> Option<GateIdentity> {
        let token = cookie_utils::cookie_value(headers, cookies::SESSION)
            .or_else(|| bearer_token(headers))?;
        let session = self.codec.verify(token)?;
        Some(GateIdentity {
            subject: session.tenant_id,
            method: self.name(),
        })
    }
}

/// Session tokens also travel as bearer credentials on programmatic calls
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Authenticates the operator via HTTP Basic credentials
pub struct OperatorAuthenticator {
    username: String,
    password_hash: String,
}

impl OperatorAuthenticator {
    /// Build the strategy from the configured username and bcrypt hash
    #[must_use]
    pub const fn new(username: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
        }
    }
}

#[async_trait::async_trait]
impl Authenticator for OperatorAuthenticator {
    fn name(&self) -> &'static str {
        "operator"
    }

    async fn authenticate(&self, headers: &HeaderMap, _uri: &Uri) -> Option<GateIdentity> {
        let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let encoded = auth_header.strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        if username != self.username {
            return None;
        }

        // bcrypt is deliberately slow; keep it off the async worker
        let password = password.to_owned();
        let hash = self.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
                .await
                .unwrap_or(false);

        verified.then(|| GateIdentity {
            subject: self.username.clone(),
            method: self.name(),
        })
    }
}

/// Ordered authentication strategies plus the deny policy
pub struct AccessGate {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AccessGate {
    /// Assemble the gate from configuration: sessions always, operator
    /// Basic auth when a password hash is configured
    #[must_use]
    pub fn new(config: &ServerConfig, codec: SessionCodec) -> Self {
        let mut authenticators: Vec<Arc<dyn Authenticator>> =
            vec![Arc::new(SessionAuthenticator::new(codec))];

        if let Some(hash) = config.gate.operator_password_hash.as_deref() {
            authenticators.push(Arc::new(OperatorAuthenticator::new(
                config.gate.operator_username.clone(),
                hash.to_owned(),
            )));
        } else {
            debug!("No operator password hash configured, operator login disabled");
        }

        Self { authenticators }
    }

    /// Ask each strategy in order; the first identity wins
    pub async fn authenticate(&self, headers: &HeaderMap, uri: &Uri) -> Option<GateIdentity> {
        for authenticator in &self.authenticators {
            if let Some(identity) = authenticator.authenticate(headers, uri).await {
                debug!(
                    method = identity.method,
                    subject = %identity.subject,
                    "Access gate passed"
                );
                return Some(identity);
            }
        }
        None
    }
}

/// Middleware enforcing the gate on everything behind it
pub async fn access_gate_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let uri = req.uri().clone();

    if let Some(identity) = state.gate.authenticate(req.headers(), &uri).await {
        req.extensions_mut().insert(identity);
        return next.run(req).await;
    }

    deny(&state, &uri, req.headers())
}

/// Build the denial response for an unauthenticated request
fn deny(state: &AppState, uri: &Uri, headers: &HeaderMap) -> Response {
    if is_api_request(uri, headers) {
        return AppError::auth_required().into_response();
    }

    if let Some(tenant_id) =
        embedded_tenant(uri, headers, state.config.platform.ui_host.as_deref())
    {
        let authorize = format!(
            "{}?{}={}",
            routes::OAUTH_AUTHORIZE,
            params::TENANT_ID,
            urlencoding::encode(&tenant_id)
        );
        return crate::routes::found(&authorize);
    }

    crate::routes::found(routes::LOGIN)
}

/// API callers want a status code, not a login page
fn is_api_request(uri: &Uri, headers: &HeaderMap) -> bool {
    if uri.path().starts_with("/api/") {
        return true;
    }
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// The tenant to route into the install flow, when the request looks like
/// a platform-embedded page load that names one
fn embedded_tenant(uri: &Uri, headers: &HeaderMap, ui_host: Option<&str>) -> Option<String> {
    let query = uri.query()?;

    let mut tenant_id = None;
    let mut embed_marker = false;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            params::TENANT_ID if !value.is_empty() => tenant_id = Some(value.into_owned()),
            params::EMBED_MARKER => embed_marker = true,
            _ => {}
        }
    }
    let tenant_id = tenant_id?;

    let referer_from_platform = ui_host.is_some_and(|host| {
        headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .and_then(|referer| url::Url::parse(referer).ok())
            .is_some_and(|referer| {
                referer
                    .host_str()
                    .is_some_and(|referer_host| referer_host.eq_ignore_ascii_case(host))
            })
    });

    (embed_marker || referer_from_platform).then_some(tenant_id)
}

// ABOUTME: Three-way tenant resolution from explicit request hints to a usable credential
// ABOUTME: Precedence is query parameter, then header, then verified session cookie
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Credential Resolver
//!
//! Turns a request into one of three answers: a tenant with a usable
//! access token, a tenant that needs to (re)connect, or no tenant at all.
//! Callers pass the request context in explicitly as [`TenantHints`];
//! nothing here reads task-local or global state.
//!
//! The bare `tenantId` query parameter is trusted as-is. That is a
//! deliberate convenience for pages embedded inside the platform UI, which
//! cannot attach headers or first-party cookies; surfaces that must not
//! take a caller's word for it sit behind the access gate instead.

use axum::http::{HeaderMap, Uri};
use tracing::warn;

use crate::auth::SessionCodec;
use crate::constants::{cookies, params};
use crate::credentials::CredentialStore;
use crate::errors::AppResult;
use crate::utils::cookies as cookie_utils;

/// Tenant identity hints carried by a request, strongest first
#[derive(Debug, Clone, Default)]
pub struct TenantHints {
    /// `tenantId` query parameter
    pub query_tenant: Option<String>,
    /// `x-tenant-id` header
    pub header_tenant: Option<String>,
    /// Session cookie value, not yet verified
    pub session_token: Option<String>,
}

impl TenantHints {
    /// Collect hints from a request's URI and headers
    #[must_use]
    pub fn from_parts(uri: &Uri, headers: &HeaderMap) -> Self {
        let query_tenant = uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == params::TENANT_ID)
                .map(|(_, value)| value.into_owned())
        });

        let header_tenant = headers
            .get(params::TENANT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let session_token =
            cookie_utils::cookie_value(headers, cookies::SESSION).map(str::to_owned);

        Self {
            query_tenant,
            header_tenant,
            session_token,
        }
    }
}

/// How a request resolved, tenant-wise
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Tenant identified and a usable access token produced
    Resolved {
        /// The tenant the request acts on behalf of
        tenant_id: String,
        /// Bearer token for platform API calls
        access_token: String,
    },
    /// Tenant identified but no credential could be produced; the tenant
    /// has to go through the install flow
    NeedsConnect {
        /// The tenant that needs to connect
        tenant_id: String,
    },
    /// The request carried no tenant context at all
    Unresolved,
}

/// Resolves request hints to a credentialed tenant
#[derive(Clone)]
pub struct CredentialResolver {
    credentials: CredentialStore,
    codec: SessionCodec,
}

impl CredentialResolver {
    /// Build a resolver over the credential store and session codec
    #[must_use]
    pub const fn new(credentials: CredentialStore, codec: SessionCodec) -> Self {
        Self { credentials, codec }
    }

    /// Resolve a request to a tenant and credential
    ///
    /// An identified tenant without a credential is a normal outcome
    /// (`NeedsConnect`), not an error.
    ///
    /// # Errors
    /// Returns an error when credential storage fails twice in a row
    #[tracing::instrument(skip(self, hints))]
    pub async fn resolve(&self, hints: &TenantHints) -> AppResult<Resolution> {
        let Some(tenant_id) = self.identify(hints) else {
            return Ok(Resolution::Unresolved);
        };

        match self.get_or_refresh_with_retry(&tenant_id).await? {
            Some(access_token) => Ok(Resolution::Resolved {
                tenant_id,
                access_token,
            }),
            None => Ok(Resolution::NeedsConnect { tenant_id }),
        }
    }

    /// Pick the tenant id from the strongest hint that names one
    fn identify(&self, hints: &TenantHints) -> Option<String> {
        if let Some(tenant) = non_empty(hints.query_tenant.as_deref()) {
            return Some(tenant.to_owned());
        }
        if let Some(tenant) = non_empty(hints.header_tenant.as_deref()) {
            return Some(tenant.to_owned());
        }
        hints
            .session_token
            .as_deref()
            .and_then(|token| self.codec.verify(token))
            .map(|session| session.tenant_id)
    }

    /// One retry for storage hiccups; a second failure propagates
    async fn get_or_refresh_with_retry(&self, tenant_id: &str) -> AppResult<Option<String>> {
        match self.credentials.get_or_refresh(tenant_id).await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(tenant_id, error = %e, "Credential lookup failed, retrying once");
                self.credentials.get_or_refresh(tenant_id).await
            }
        }
    }
}

/// Treat empty strings as absent
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

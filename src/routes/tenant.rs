// ABOUTME: Gated tenant status route reporting whether a tenant has a usable credential
// ABOUTME: The canonical call-site of the credential resolver; never serializes token material
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Tenant status route
//!
//! `GET /api/tenant/status` resolves the caller's tenant from the usual
//! hint chain and reports connection state. `NeedsConnect` comes back as
//! `connected: false` plus the URL that starts an install; a request
//! with no tenant hint at all is a 401.

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::constants::{params, routes};
use crate::errors::AppError;
use crate::resolver::{Resolution, TenantHints};
use crate::server::AppState;

/// Tenant status routes implementation
pub struct TenantRoutes;

impl TenantRoutes {
    /// Create the tenant status route
    pub fn routes(state: AppState) -> Router {
        Router::new()
            .route(routes::API_TENANT_STATUS, get(Self::status))
            .with_state(state)
    }

    /// Report whether the caller's tenant holds a usable credential
    async fn status(
        State(state): State<AppState>,
        uri: Uri,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let hints = TenantHints::from_parts(&uri, &headers);

        match state.resolver.resolve(&hints).await? {
            // The token stays in-process; only the fact of its existence
            // crosses the wire
            Resolution::Resolved { tenant_id, .. } => Ok(Json(serde_json::json!({
                "tenantId": tenant_id,
                "connected": true,
            }))
            .into_response()),
            Resolution::NeedsConnect { tenant_id } => {
                let connect_url = format!(
                    "{}?{}={}",
                    routes::OAUTH_AUTHORIZE,
                    params::TENANT_ID,
                    urlencoding::encode(&tenant_id)
                );
                Ok(Json(serde_json::json!({
                    "tenantId": tenant_id,
                    "connected": false,
                    "connectUrl": connect_url,
                }))
                .into_response())
            }
            Resolution::Unresolved => Err(AppError::auth_required()),
        }
    }
}

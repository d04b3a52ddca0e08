// ABOUTME: Env-gated read-only debug route exposing credential previews
// ABOUTME: Serializes token length and edges only; full secret values never leave the store
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Credential preview route
//!
//! Disabled unless `EXPOSE_TOKEN_DEBUG=true`; when disabled it answers
//! 404 so probing cannot tell the route apart from one that does not
//! exist. Even when enabled, tokens serialize as [`TokenPreview`] only.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::constants::routes;
use crate::errors::AppError;
use crate::models::TokenPreview;
use crate::server::AppState;

/// Query parameters for the credential preview route
#[derive(Debug, Deserialize)]
struct DebugQuery {
    /// Tenant whose stored credential to preview
    #[serde(rename = "tenantId")]
    tenant_id: Option<String>,
}

/// Debug routes implementation
pub struct DebugRoutes;

impl DebugRoutes {
    /// Create the credential preview route
    pub fn routes(state: AppState) -> Router {
        Router::new()
            .route(routes::DEBUG_CREDENTIALS, get(Self::credentials))
            .with_state(state)
    }

    /// Preview stored credentials for a tenant and the umbrella
    async fn credentials(
        State(state): State<AppState>,
        Query(query): Query<DebugQuery>,
    ) -> Result<Response, AppError> {
        if !state.config.expose_token_debug {
            return Err(AppError::not_found("Not found"));
        }

        let tenant = match query.tenant_id.as_deref().filter(|t| !t.is_empty()) {
            Some(tenant_id) => state
                .credentials
                .stored_tenant_credential(tenant_id)
                .await?
                .map(|credential| {
                    serde_json::json!({
                        "tenant_id": credential.tenant_id,
                        "access_token": TokenPreview::of(&credential.access_token),
                        "refresh_token": TokenPreview::of(&credential.refresh_token),
                        "expires_at": credential.expires_at.to_rfc3339(),
                        "obtained_at": credential.obtained_at.to_rfc3339(),
                        "expired": credential.is_expired_at(chrono::Utc::now()),
                    })
                }),
            None => None,
        };

        let umbrella = state
            .credentials
            .stored_umbrella_credential()
            .await?
            .map(|credential| {
                serde_json::json!({
                    "umbrella_id": credential.umbrella_id,
                    "access_token": TokenPreview::of(&credential.access_token),
                    "refresh_token": TokenPreview::of(&credential.refresh_token),
                    "expires_at": credential.expires_at.to_rfc3339(),
                    "expired": credential.is_expired_at(chrono::Utc::now()),
                })
            });

        Ok(Json(serde_json::json!({
            "tenant": tenant,
            "umbrella": umbrella,
        }))
        .into_response())
    }
}

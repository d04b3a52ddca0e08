// ABOUTME: Install flow route handlers for the authorize and callback endpoints
// ABOUTME: Thin wrappers that turn FlowController outcomes into redirects plus Set-Cookie headers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Install flow routes
//!
//! `GET /oauth/authorize` starts an install and redirects out to the
//! identity provider; configuration failures surface as JSON errors
//! because there is nowhere sensible to send the browser yet.
//!
//! `GET /oauth/callback` is the provider's redirect target. It cannot
//! fail at the HTTP level: whatever happened, the browser is redirected
//! to the landing page with the outcome in query parameters.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::constants::routes;
use crate::errors::AppError;
use crate::oauth::{AuthorizeRequest, CallbackQuery};
use crate::server::AppState;
use crate::utils::cookies;

/// Install flow routes implementation
pub struct OAuthRoutes;

impl OAuthRoutes {
    /// Create the authorize and callback routes
    pub fn routes(state: AppState) -> Router {
        Router::new()
            .route(routes::OAUTH_AUTHORIZE, get(Self::authorize))
            .route(routes::OAUTH_CALLBACK, get(Self::callback))
            .with_state(state)
    }

    /// Start an install: stage context, redirect to the provider
    async fn authorize(
        State(state): State<AppState>,
        Query(request): Query<AuthorizeRequest>,
    ) -> Result<Response, AppError> {
        let outcome = state.flow.begin_authorize(&request).await?;

        let mut response = super::found(&outcome.authorize_url);
        for cookie in &outcome.cookies {
            cookies::append_set_cookie(response.headers_mut(), cookie);
        }
        Ok(response)
    }

    /// Complete an install; always lands, never errors
    async fn callback(
        State(state): State<AppState>,
        Query(query): Query<CallbackQuery>,
        headers: HeaderMap,
    ) -> Response {
        let outcome = state.flow.handle_callback(&query, &headers).await;

        let mut response = super::found(&outcome.location);
        for cookie in &outcome.cookies {
            cookies::append_set_cookie(response.headers_mut(), cookie);
        }
        response
    }
}

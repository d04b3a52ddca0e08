// ABOUTME: Route module organization for the Moorgate HTTP surface
// ABOUTME: Each domain module holds route definitions and thin handlers that delegate to the engine
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Route modules for the Moorgate server
//!
//! Each domain module contains only route definitions and thin handler
//! functions that delegate to the flow controller, credential store, or
//! config. Handlers stay small; the interesting behavior lives in the
//! modules they call.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Env-gated read-only credential previews
pub mod debug;
/// Liveness endpoint
pub mod health;
/// Install flow endpoints (authorize and callback)
pub mod oauth;
/// Browser-facing pages (landing and login)
pub mod pages;
/// Gated tenant status endpoint
pub mod tenant;

pub use debug::DebugRoutes;
pub use health::HealthRoutes;
pub use oauth::OAuthRoutes;
pub use pages::PagesRoutes;
pub use tenant::TenantRoutes;

/// Plain `302 Found` redirect
///
/// `axum::response::Redirect` only offers 303/307/308; the install flow
/// and the gate both answer with the classic 302 browsers and the
/// platform expect.
pub(crate) fn found(location: &str) -> Response {
    match header::HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

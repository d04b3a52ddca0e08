// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Provides liveness and readiness endpoints for monitoring infrastructure
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Health check routes for service monitoring
//!
//! `/health` pings the database so a wedged SQLite file shows up in
//! monitoring; `/ready` answers statically for load balancer checks.
//! Both are unauthenticated.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::constants::routes;
use crate::server::AppState;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(state: AppState) -> Router {
        async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
            let database_ok = sqlx::query("SELECT 1")
                .execute(state.database.pool())
                .await
                .is_ok();

            let status = if database_ok { "healthy" } else { "degraded" };
            let code = if database_ok {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };

            (
                code,
                Json(serde_json::json!({
                    "status": status,
                    "service": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": chrono::Utc::now().to_rfc3339()
                })),
            )
        }

        async fn ready_handler() -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "status": "ready",
                "timestamp": chrono::Utc::now().to_rfc3339()
            }))
        }

        Router::new()
            .route(routes::HEALTH, get(health_handler))
            .route("/ready", get(ready_handler))
            .with_state(state)
    }
}

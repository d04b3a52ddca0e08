// ABOUTME: Browser-facing pages: the install landing page and the operator login page
// ABOUTME: The landing page is the display-only consumer of the callback's outcome parameters
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Browser-facing pages
//!
//! The landing page renders whatever outcome the callback redirect put
//! in the query string. It is the one place raw error codes are shown
//! to a human; everything user-controlled is HTML-escaped on the way in.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::constants::routes;
use crate::server::AppState;
use crate::utils::html::escape_html;

/// Query parameters the callback redirect leaves on the landing URL
#[derive(Debug, Deserialize)]
struct LandingParams {
    /// `1` on a successful install
    success: Option<String>,
    /// Tenant the install produced a credential for
    #[serde(rename = "tenantId")]
    tenant_id: Option<String>,
    /// Machine-readable failure code
    error: Option<String>,
    /// Human-oriented failure detail
    error_description: Option<String>,
    /// Safe in-app path to send the user back to
    #[serde(rename = "return")]
    return_path: Option<String>,
}

/// Browser page routes implementation
pub struct PagesRoutes;

impl PagesRoutes {
    /// Create the landing and login page routes
    pub fn routes(state: AppState) -> Router {
        let landing_path = state.config.landing_path.clone();
        Router::new()
            .route(&landing_path, get(Self::landing))
            .route(routes::LOGIN, get(Self::login))
            .with_state(state)
    }

    /// Render the install outcome carried in the query string
    async fn landing(Query(params): Query<LandingParams>) -> Html<String> {
        let body = if let Some(error) = params.error.as_deref() {
            let description = params
                .error_description
                .as_deref()
                .unwrap_or("No further detail was reported.");
            format!(
                r#"<h2 class="bad">Connection failed</h2>
        <div class="panel">
            <strong>Error:</strong> <code>{error}</code><br>
            <strong>Details:</strong> {description}
        </div>
        <p>You can retry the installation from the app marketplace.</p>"#,
                error = escape_html(error),
                description = escape_html(description),
            )
        } else if params.success.as_deref() == Some("1") {
            let tenant = params.tenant_id.as_deref().unwrap_or("unknown");
            let return_link = params
                .return_path
                .as_deref()
                // The redirect sanitized this once, but the landing page is
                // its own request and the query string can be hand-edited
                .filter(|p| p.starts_with('/') && !p.starts_with("//"))
                .map(|p| {
                    format!(
                        r#"<p><a href="{href}">Continue to the app</a></p>"#,
                        href = escape_html(p)
                    )
                })
                .unwrap_or_default();
            format!(
                r#"<h2 class="good">Connected</h2>
        <div class="panel">
            <strong>Tenant:</strong> <code>{tenant}</code>
        </div>
        <p>The installation completed and credentials are stored.</p>
        {return_link}"#,
                tenant = escape_html(tenant),
            )
        } else {
            r"<h2>Nothing to show</h2>
        <p>This page displays the outcome of an installation. Start one from
        the app marketplace or the authorize endpoint.</p>"
                .to_owned()
        };

        Html(page("Connection status", &body))
    }

    /// Minimal operator login hint page the gate redirects to
    async fn login(State(state): State<AppState>) -> Html<String> {
        let authorize = routes::OAUTH_AUTHORIZE;
        let operator_hint = if state.config.gate.operator_password_hash.is_some() {
            r"<p>Operators can authenticate with HTTP Basic credentials on any
        request instead.</p>"
        } else {
            ""
        };
        let body = format!(
            r#"<h2>Sign in</h2>
        <p>Sessions are minted by completing an installation. Enter your
        tenant id to start one.</p>
        <form method="get" action="{authorize}">
            <div class="form-group">
                <label for="tenantId">Tenant id:</label>
                <input type="text" id="tenantId" name="tenantId" required>
            </div>
            <button type="submit">Connect</button>
        </form>
        {operator_hint}"#
        );
        Html(page("Sign in", &body))
    }
}

/// Shared page chrome; `body` is already-escaped HTML
fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Moorgate - {title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        .card {{ max-width: 480px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }}
        .panel {{ background-color: #f8f9fa; padding: 15px; border-radius: 4px; margin-bottom: 20px; }}
        .good {{ color: #1a7f37; }}
        .bad {{ color: #b42318; }}
        .form-group {{ margin-bottom: 15px; }}
        label {{ display: block; margin-bottom: 5px; font-weight: bold; }}
        input {{ width: 100%; padding: 8px; border: 1px solid #ccc; border-radius: 4px; }}
        button {{ background-color: #007bff; color: white; padding: 10px 20px; border: none; border-radius: 4px; cursor: pointer; }}
        code {{ background-color: #f1f3f5; padding: 2px 4px; border-radius: 3px; }}
    </style>
</head>
<body>
    <div class="card">
        {body}
    </div>
</body>
</html>
"#
    )
}

// ABOUTME: Domain constants grouped by concern (routes, cookies, params, time)
// ABOUTME: Single source of truth for names shared across flow, gate, and routes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Application constants organized by domain.

/// Route paths served by this engine
pub mod routes {
    /// Starts the install flow; redirects out to the identity provider
    pub const OAUTH_AUTHORIZE: &str = "/oauth/authorize";
    /// Provider redirect target; completes the install flow
    pub const OAUTH_CALLBACK: &str = "/oauth/callback";
    /// Liveness endpoint
    pub const HEALTH: &str = "/health";
    /// Env-gated read-only credential preview endpoint
    pub const DEBUG_CREDENTIALS: &str = "/debug/credentials";
    /// Gated JSON endpoint reporting whether the caller's tenant is connected
    pub const API_TENANT_STATUS: &str = "/api/tenant/status";
    /// Operator login page the gate sends unauthenticated browsers to
    pub const LOGIN: &str = "/login";
    /// Default landing path the callback redirects to
    pub const DEFAULT_LANDING: &str = "/connected";
}

/// Browser cookie names
pub mod cookies {
    /// Signed session token proving "I represent tenant T"
    pub const SESSION: &str = "moorgate_session";
    /// Short-lived mirror of the install session's tenant id
    pub const INSTALL_TENANT: &str = "moorgate_install_tenant";
    /// Short-lived mirror of the install session's umbrella id
    pub const INSTALL_UMBRELLA: &str = "moorgate_install_umbrella";
    /// Short-lived mirror of the requested post-install return path
    pub const INSTALL_RETURN: &str = "moorgate_install_return";
}

/// Query parameter and header names
pub mod params {
    /// Explicit tenant id query parameter (highest resolution precedence)
    pub const TENANT_ID: &str = "tenantId";
    /// Explicit umbrella id query parameter at Authorize
    pub const UMBRELLA_ID: &str = "umbrellaId";
    /// Requested post-install return path at Authorize
    pub const RETURN_PATH: &str = "returnPath";
    /// Marker a platform-embedded page includes so gate failures re-enter
    /// the install flow instead of bouncing to the login page
    pub const EMBED_MARKER: &str = "embed";
    /// Explicit tenant id header (second resolution precedence)
    pub const TENANT_ID_HEADER: &str = "x-tenant-id";
}

/// Query parameters carried on the landing-page redirect
pub mod landing {
    /// Present (as `1`) on a successful install
    pub const SUCCESS: &str = "success";
    /// Tenant the install produced a credential for
    pub const TENANT_ID: &str = "tenantId";
    /// Machine-readable failure code
    pub const ERROR: &str = "error";
    /// Human-oriented failure detail, when one is known
    pub const ERROR_DESCRIPTION: &str = "error_description";
    /// Echo of a safe `returnPath` recorded at Authorize
    pub const RETURN: &str = "return";
}

/// TTLs and clock-related tuning
pub mod time {
    /// Install session lifetime; an expired entry is indistinguishable
    /// from one that never existed
    pub const INSTALL_SESSION_TTL_SECS: i64 = 600;
    /// Install mirror cookies live exactly as long as the install session
    pub const INSTALL_COOKIE_MAX_AGE_SECS: i64 = INSTALL_SESSION_TTL_SECS;
    /// Default session token lifetime
    pub const SESSION_TTL_HOURS: i64 = 24;
    /// A credential expiring within this window is treated as expired so
    /// it cannot lapse mid-request
    pub const CREDENTIAL_EXPIRY_BUFFER_SECS: i64 = 60;
}

/// Outbound HTTP client tuning
pub mod http_client {
    /// Total request deadline for provider calls
    pub const TIMEOUT_SECS: u64 = 10;
    /// Connect deadline for provider calls
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;
}

/// Inbound HTTP server tuning
pub mod http_server {
    /// Deadline for any single inbound request
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Diagnostic output limits
pub mod previews {
    /// Characters of a secret kept at each edge of a preview
    pub const TOKEN_PREVIEW_EDGE: usize = 4;
}

/// Server defaults, overridable through the environment
pub mod defaults {
    /// Default HTTP listen port
    pub const HTTP_PORT: u16 = 8080;
    /// Default SQLite database URL (`rwc`: create the file when absent)
    pub const DATABASE_URL: &str = "sqlite:data/moorgate.db?mode=rwc";
    /// Umbrella id recorded when neither the grant nor the install names one
    pub const UMBRELLA_ID: &str = "default";
}

// ABOUTME: Cookie helpers for the install flow and browser sessions
// ABOUTME: Builds Set-Cookie values and extracts named cookies from request headers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Cookie parsing and construction. The install flow stages tenant context
//! in short-lived cookies so the callback can recover it even when the
//! state entry is gone; the session cookie carries the signed tenant token.
//!
//! Everything here is `SameSite=Lax`: the platform returns the browser to
//! the callback via a top-level redirect, and Lax cookies still ride along
//! on those while staying home for cross-site subrequests.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::constants::{cookies, time};

/// Extract a named cookie's value from request headers
#[must_use]
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix(name)?.strip_prefix('=')
    })
}

/// Build the session cookie for a freshly minted tenant token
#[must_use]
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={token}; HttpOnly; Secure; Path=/; SameSite=Lax; Max-Age={max_age_secs}",
        cookies::SESSION
    )
}

/// Build a short-lived cookie staging install context for the callback
#[must_use]
pub fn install_cookie(name: &str, value: &str) -> String {
    format!(
        "{name}={value}; HttpOnly; Secure; Path=/; SameSite=Lax; Max-Age={}",
        time::INSTALL_COOKIE_MAX_AGE_SECS
    )
}

/// Build a cookie that expires immediately, clearing any prior value
#[must_use]
pub fn clear_cookie(name: &str) -> String {
    format!("{name}=; HttpOnly; Secure; Path=/; SameSite=Lax; Max-Age=0")
}

/// Append a Set-Cookie header, preserving any already present
pub fn append_set_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(header::SET_COOKIE, value);
    }
}

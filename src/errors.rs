// ABOUTME: Unified error type with machine-readable codes and HTTP mapping
// ABOUTME: Covers the configuration / flow / storage / transient taxonomy
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Unified Error Handling
//!
//! One error type for the whole engine. Every failure carries an [`ErrorCode`]
//! that maps to an HTTP status for API responses and to a lowercase landing-page
//! code for the OAuth callback redirect. Expected non-errors (a tenant that has
//! simply not installed yet) are *not* errors and never appear here — they are
//! modeled as `Ok(None)` / `NeedsConnect` at the call sites.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication & Authorization (1000-1999)
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired = 1000,
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid = 1001,

    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Resource Management (4000-4999)
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,

    // Install flow (5000-5999)
    #[serde(rename = "MISSING_TENANT_CONTEXT")]
    MissingTenantContext = 5000,
    #[serde(rename = "EXCHANGE_FAILED")]
    ExchangeFailed = 5001,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6000,
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6001,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "STORAGE_FAILED")]
    StorageFailed = 9001,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput | Self::MissingTenantContext => 400,

            // 401 Unauthorized
            Self::AuthRequired | Self::AuthInvalid => 401,

            // 404 Not Found
            Self::ResourceNotFound => 404,

            // 502 Bad Gateway
            Self::ExchangeFailed => 502,

            // 500 Internal Server Error
            Self::ConfigMissing | Self::ConfigInvalid | Self::InternalError | Self::StorageFailed => {
                500
            }
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::MissingTenantContext => "No tenant context could be recovered for this install",
            Self::ExchangeFailed => "The identity provider rejected the token exchange",
            Self::ConfigMissing => "Required deployment configuration is missing",
            Self::ConfigInvalid => "Deployment configuration is invalid",
            Self::InternalError => "An internal server error occurred",
            Self::StorageFailed => "Credential storage operation failed",
        }
    }

    /// Lowercase code carried on the landing-page redirect after a failed
    /// install. The landing page is the only surface where these are shown
    /// to a human.
    #[must_use]
    pub fn landing_code(&self) -> &'static str {
        match self {
            Self::ConfigMissing | Self::ConfigInvalid => "config_missing",
            Self::MissingTenantContext => "missing_tenant_context",
            Self::ExchangeFailed => "exchange_failed",
            Self::StorageFailed => "storage_failed",
            Self::AuthRequired
            | Self::AuthInvalid
            | Self::InvalidInput
            | Self::ResourceNotFound
            | Self::InternalError => "internal_error",
        }
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Tenant ID if one was resolved before the failure
    pub tenant_id: Option<String>,
    /// Additional key-value context
    pub details: serde_json::Value,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            tenant_id: None,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Unified error type for the application
#[derive(Debug, thiserror::Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a tenant ID to the error context
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.context.tenant_id = Some(tenant_id.into());
        self
    }

    /// Add details to the error context
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.context.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
                tenant_id: error.context.tenant_id,
                details: error.context.details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Authentication required
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "Authentication required")
    }

    /// Invalid authentication
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// No tenant id recoverable for an in-progress install
    pub fn missing_tenant_context(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingTenantContext, message)
    }

    /// Provider rejected a code exchange, refresh, or tenant-token mint
    pub fn exchange_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExchangeFailed, message)
    }

    /// Required deployment configuration is absent
    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigMissing, message)
    }

    /// Credential persistence failed after the provider step succeeded
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageFailed, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Conversion from `sqlx::Error` — all database failures are storage failures
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::new(ErrorCode::StorageFailed, error.to_string()).with_source(error)
    }
}

/// `ring` reports all failures as an opaque `Unspecified`
impl From<ring::error::Unspecified> for AppError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::new(ErrorCode::InternalError, "cryptographic operation failed")
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(error: base64::DecodeError) -> Self {
        Self::new(ErrorCode::InvalidInput, format!("invalid base64: {error}"))
    }
}

impl From<std::array::TryFromSliceError> for AppError {
    fn from(_: std::array::TryFromSliceError) -> Self {
        Self::new(ErrorCode::InvalidInput, "unexpected data length")
    }
}

/// Conversion from `anyhow::Error` to `AppError`
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        // Extract the root cause if available for better error chaining
        match error.source() {
            Some(source) => Self::new(ErrorCode::InternalError, error.to_string()).with_details(
                serde_json::json!({
                    "source": source.to_string()
                }),
            ),
            None => Self::new(ErrorCode::InternalError, error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AuthRequired.http_status(), 401);
        assert_eq!(ErrorCode::MissingTenantContext.http_status(), 400);
        assert_eq!(ErrorCode::ExchangeFailed.http_status(), 502);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::StorageFailed.http_status(), 500);
    }

    #[test]
    fn test_landing_codes() {
        assert_eq!(ErrorCode::ConfigMissing.landing_code(), "config_missing");
        assert_eq!(
            ErrorCode::MissingTenantContext.landing_code(),
            "missing_tenant_context"
        );
        assert_eq!(ErrorCode::ExchangeFailed.landing_code(), "exchange_failed");
        assert_eq!(ErrorCode::StorageFailed.landing_code(), "storage_failed");
        assert_eq!(ErrorCode::AuthRequired.landing_code(), "internal_error");
    }

    #[test]
    fn test_app_error_creation() {
        let error = AppError::missing_tenant_context("no install state for state value")
            .with_tenant_id("loc_1");

        assert_eq!(error.code, ErrorCode::MissingTenantContext);
        assert_eq!(error.context.tenant_id.as_deref(), Some("loc_1"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::storage("write failed").with_tenant_id("loc_42");
        let response = ErrorResponse::from(error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("STORAGE_FAILED"));
        assert!(json.contains("loc_42"));
    }
}

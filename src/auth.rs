// ABOUTME: Stateless browser session tokens binding a visitor to a tenant
// ABOUTME: HS256-signed JWTs with clock-pinnable verification and a uniform failure mode
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Session Token Codec
//!
//! Mints and verifies the signed session tokens the server sets as a cookie
//! after a completed install. Tokens are self-contained; there is no
//! server-side session table. Verification collapses every failure mode
//! (bad signature, malformed payload, expired) into `None` so callers cannot
//! distinguish a forged token from a stale one.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// `JWT` claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Tenant the session is bound to
    pub sub: String,
    /// Issued at timestamp (epoch seconds)
    pub iat: i64,
    /// Expiration timestamp (epoch seconds)
    pub exp: i64,
}

/// A session token that passed signature and expiry checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    /// Tenant recovered from the token
    pub tenant_id: String,
}

/// Mints and verifies tenant session tokens
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionCodec {
    /// Create a codec from the shared signing secret
    #[must_use]
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Session lifetime, used for the cookie max-age
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a session token for a tenant
    ///
    /// # Errors
    /// Returns an error if `JWT` signing fails
    pub fn mint(&self, tenant_id: &str) -> AppResult<String> {
        self.mint_at(tenant_id, Utc::now())
    }

    /// Mint a session token with a caller-supplied clock
    ///
    /// # Errors
    /// Returns an error if `JWT` signing fails
    pub fn mint_at(&self, tenant_id: &str, now: DateTime<Utc>) -> AppResult<String> {
        let claims = SessionClaims {
            sub: tenant_id.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign session token: {e}")))
    }

    /// Verify a session token against the current clock
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<VerifiedSession> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a session token with a caller-supplied clock
    ///
    /// Expiry is checked manually against `now` rather than inside the `JWT`
    /// library so the clock can be pinned. A token is expired once `now`
    /// reaches its `exp` claim; there is no leeway.
    #[must_use]
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<VerifiedSession> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => token_data.claims,
            Err(e) => {
                tracing::debug!("Session token rejected: {e}");
                return None;
            }
        };

        if now.timestamp() >= claims.exp {
            tracing::debug!(tenant_id = %claims.sub, "Session token expired");
            return None;
        }

        Some(VerifiedSession {
            tenant_id: claims.sub,
        })
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

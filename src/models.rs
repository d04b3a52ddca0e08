// ABOUTME: Core data models for tenant and umbrella credentials plus previews
// ABOUTME: Includes AES-256-GCM encryption at rest for token columns
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Core Data Models
//!
//! Credential models live in memory only while a request needs them; at rest
//! both token columns are AES-256-GCM encrypted with independent nonces.
//! Nothing in this module serializes a full secret: credentials deliberately
//! do not implement `Serialize`, their `Debug` output is redacted, and the
//! only diagnostic representation is the truncated [`TokenPreview`].

use crate::constants::{previews, time};
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One tenant's credential for the third-party platform.
///
/// Created on first successful callback, overwritten on refresh or
/// reinstall. Owned exclusively by the credential store.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantCredential {
    /// Stable id of the tenant this credential acts for
    pub tenant_id: String,
    /// Plain text access token (in memory only)
    pub access_token: String,
    /// Plain text refresh token (in memory only)
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
    /// When this credential was obtained from the provider
    pub obtained_at: DateTime<Utc>,
}

impl TenantCredential {
    /// Whether the access token is expired (or lapses within the safety
    /// buffer) at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(time::CREDENTIAL_EXPIRY_BUFFER_SECS)
    }

    /// Whether the access token is expired right now
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for TenantCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantCredential")
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// The deployment-wide umbrella credential.
///
/// At most one exists at a time; used to mint tenant-scoped credentials
/// without each tenant completing a full consent flow.
#[derive(Clone, PartialEq, Eq)]
pub struct UmbrellaCredential {
    /// Id the provider assigned to the umbrella account
    pub umbrella_id: String,
    /// Plain text access token (in memory only)
    pub access_token: String,
    /// Plain text refresh token (in memory only)
    pub refresh_token: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl UmbrellaCredential {
    /// Whether the access token is expired (or lapses within the safety
    /// buffer) at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(time::CREDENTIAL_EXPIRY_BUFFER_SECS)
    }

    /// Whether the access token is expired right now
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for UmbrellaCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UmbrellaCredential")
            .field("umbrella_id", &self.umbrella_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Truncated representation of a secret for diagnostic surfaces.
///
/// The only form in which token material may serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPreview {
    /// Total length of the secret
    pub length: usize,
    /// First few characters
    pub head: String,
    /// Last few characters
    pub tail: String,
}

impl TokenPreview {
    /// Build a preview of `secret`, keeping
    /// [`previews::TOKEN_PREVIEW_EDGE`] characters at each end. Secrets too
    /// short to truncate meaningfully preview as empty edges rather than
    /// leaking whole.
    #[must_use]
    pub fn of(secret: &str) -> Self {
        let edge = previews::TOKEN_PREVIEW_EDGE;
        if secret.chars().count() <= edge * 2 {
            return Self {
                length: secret.len(),
                head: String::new(),
                tail: String::new(),
            };
        }
        Self {
            length: secret.len(),
            head: secret.chars().take(edge).collect(),
            tail: secret
                .chars()
                .rev()
                .take(edge)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect(),
        }
    }
}

/// Encrypted token pair for storage at rest.
///
/// Both fields are AES-256-GCM encrypted with independent nonces; each
/// nonce is prepended to its ciphertext (base64 encoded:
/// `[12-byte nonce][ciphertext]`). Only decrypted when a request needs the
/// credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedToken {
    /// Encrypted access token with prepended nonce
    pub access_token: String,
    /// Encrypted refresh token with prepended nonce
    pub refresh_token: String,
}

/// Decrypted token pair. Never stored; exists only in memory while a
/// credential is being read or refreshed.
#[derive(Clone)]
pub struct DecryptedToken {
    /// Plain text access token
    pub access_token: String,
    /// Plain text refresh token
    pub refresh_token: String,
}

impl fmt::Debug for DecryptedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl EncryptedToken {
    /// Encrypt an access/refresh pair with independent nonces.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails or the encryption key is invalid
    pub fn new(access_token: &str, refresh_token: &str, encryption_key: &[u8]) -> AppResult<Self> {
        Ok(Self {
            access_token: seal(access_token, encryption_key)?,
            refresh_token: seal(refresh_token, encryption_key)?,
        })
    }

    /// Decrypt the pair for use.
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails, a nonce is malformed, or the
    /// encryption key is wrong
    pub fn decrypt(&self, encryption_key: &[u8]) -> AppResult<DecryptedToken> {
        Ok(DecryptedToken {
            access_token: open(&self.access_token, encryption_key, "access token")?,
            refresh_token: open(&self.refresh_token, encryption_key, "refresh token")?,
        })
    }
}

/// Encrypt one secret: fresh nonce, nonce prepended, base64 encoded
fn seal(plaintext: &str, encryption_key: &[u8]) -> AppResult<String> {
    use base64::{engine::general_purpose, Engine as _};
    use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
    use ring::rand::{SecureRandom, SystemRandom};

    let mut nonce_bytes = [0u8; 12];
    SystemRandom::new().fill(&mut nonce_bytes)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let key = LessSafeKey::new(UnboundKey::new(&AES_256_GCM, encryption_key)?);

    let mut data = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut data)?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend(data);
    Ok(general_purpose::STANDARD.encode(combined))
}

/// Decrypt one secret: split the prepended nonce, open, validate UTF-8
fn open(encoded: &str, encryption_key: &[u8], label: &str) -> AppResult<String> {
    use base64::{engine::general_purpose, Engine as _};
    use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};

    let combined = general_purpose::STANDARD.decode(encoded)?;
    if combined.len() < 12 {
        return Err(AppError::invalid_input(format!(
            "Invalid {label}: too short"
        )));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(12);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes.try_into()?);

    let key = LessSafeKey::new(UnboundKey::new(&AES_256_GCM, encryption_key)?);

    let mut data = ciphertext.to_vec();
    let plaintext = key.open_in_place(nonce, Aad::empty(), &mut data)?;
    String::from_utf8(plaintext.to_vec())
        .map_err(|e| AppError::invalid_input(format!("Invalid UTF-8 in {label}: {e}")))
}

// ABOUTME: In-memory single-use install sessions keyed by the OAuth state parameter
// ABOUTME: Entries expire after ten minutes and are swept opportunistically on insert
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Install Session Store
//!
//! Holds the context captured at the authorize endpoint until the platform
//! redirects back. The state key doubles as the CSRF token: it is
//! unguessable, single-use, and short-lived. Consuming a state removes it,
//! so a replayed callback finds nothing.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::time::INSTALL_SESSION_TTL_SECS;

/// Context captured when an install begins
#[derive(Debug, Clone)]
pub struct InstallSession {
    /// Tenant that initiated the install
    pub tenant_id: String,
    /// Umbrella the tenant claimed, when one was provided
    pub umbrella_id: Option<String>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session stops being honored
    pub expires_at: DateTime<Utc>,
}

/// Single-use store of pending installs keyed by state
#[derive(Clone)]
pub struct InstallSessionStore {
    sessions: Arc<tokio::sync::RwLock<HashMap<String, InstallSession>>>,
    ttl: Duration,
}

impl Default for InstallSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallSessionStore {
    /// Create an empty store with the default ten minute entry lifetime
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            ttl: Duration::seconds(INSTALL_SESSION_TTL_SECS),
        }
    }

    /// Record a pending install and return the state parameter for it
    pub async fn put(&self, tenant_id: &str, umbrella_id: Option<&str>) -> String {
        self.put_at(tenant_id, umbrella_id, Utc::now()).await
    }

    /// Record a pending install with a caller-supplied clock
    pub async fn put_at(
        &self,
        tenant_id: &str,
        umbrella_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        // Version 4 UUIDs carry 122 random bits, enough to make states unguessable
        let state = Uuid::new_v4().to_string();

        let session = InstallSession {
            tenant_id: tenant_id.to_owned(),
            umbrella_id: umbrella_id.map(str::to_owned),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(state.clone(), session);

        // Sweep expired entries while the write lock is held
        sessions.retain(|_, s| s.expires_at > now);

        state
    }

    /// Consume the session for a state, if it exists and has not expired
    ///
    /// The entry is removed regardless of the outcome, so a state can never
    /// be honored twice.
    pub async fn take(&self, state: &str) -> Option<InstallSession> {
        self.take_at(state, Utc::now()).await
    }

    /// Consume with a caller-supplied clock
    pub async fn take_at(&self, state: &str, now: DateTime<Utc>) -> Option<InstallSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(state)?;

        if session.expires_at <= now {
            return None;
        }

        Some(session)
    }

    /// Number of pending installs currently held
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no installs are pending
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

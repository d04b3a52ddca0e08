// ABOUTME: Credential store combining stored rows, lazy refresh, and umbrella minting
// ABOUTME: Returns None when a tenant cannot be credentialed without a new install
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Credential Store
//!
//! Answers one question: "give me a usable access token for this tenant".
//! It consults the database first, refreshes through the platform when the
//! stored grant has aged out, and falls back to minting a fresh tenant
//! grant from the umbrella credential. `Ok(None)` means the tenant needs a
//! (re)install; `Err` is reserved for storage and encryption failures an
//! operator has to look at.
//!
//! Refresh is lazy. Nothing here runs on a timer; expiry is only noticed
//! when a tenant is asked for.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{TenantCredential, UmbrellaCredential};
use crate::oauth::{PlatformConnector, TokenGrant};

/// Store and resolver for platform credentials
#[derive(Clone)]
pub struct CredentialStore {
    database: Database,
    connector: Arc<dyn PlatformConnector>,
}

impl CredentialStore {
    /// Build a store over the database and a platform connector
    #[must_use]
    pub fn new(database: Database, connector: Arc<dyn PlatformConnector>) -> Self {
        Self {
            database,
            connector,
        }
    }

    /// Produce a usable access token for a tenant, refreshing or minting
    /// as needed
    ///
    /// `Ok(None)` means no credential could be produced and the tenant has
    /// to go through the install flow.
    ///
    /// # Errors
    /// Returns an error only for storage or encryption failures; platform
    /// rejections degrade to the next source and finally to `Ok(None)`
    pub async fn get_or_refresh(&self, tenant_id: &str) -> AppResult<Option<String>> {
        if let Some(credential) = self.database.tenant_credential(tenant_id).await? {
            if !credential.is_expired() {
                debug!(tenant_id, "Stored tenant credential is fresh");
                return Ok(Some(credential.access_token));
            }

            match self.connector.refresh_token(&credential.refresh_token).await {
                Ok(grant) => {
                    self.persist_tenant_grant(tenant_id, &grant).await?;
                    info!(tenant_id, "Refreshed expired tenant credential");
                    return Ok(Some(grant.access_token));
                }
                Err(e) => {
                    warn!(
                        tenant_id,
                        error = %e,
                        "Tenant refresh rejected, falling back to umbrella mint"
                    );
                }
            }
        }

        self.mint_from_umbrella(tenant_id).await
    }

    /// Mint a tenant grant from the umbrella credential, if one is usable
    async fn mint_from_umbrella(&self, tenant_id: &str) -> AppResult<Option<String>> {
        let Some((umbrella_id, umbrella_token)) = self.umbrella_access_token().await? else {
            debug!(tenant_id, "No umbrella credential available");
            return Ok(None);
        };

        match self
            .connector
            .mint_tenant_token(&umbrella_token, &umbrella_id, tenant_id)
            .await
        {
            Ok(grant) => {
                self.persist_tenant_grant(tenant_id, &grant).await?;
                info!(tenant_id, umbrella_id, "Minted tenant credential from umbrella");
                Ok(Some(grant.access_token))
            }
            Err(e) => {
                warn!(tenant_id, umbrella_id, error = %e, "Tenant mint rejected");
                Ok(None)
            }
        }
    }

    /// A fresh umbrella access token plus its umbrella id, refreshing the
    /// stored credential if it has expired
    async fn umbrella_access_token(&self) -> AppResult<Option<(String, String)>> {
        let Some(umbrella) = self.database.umbrella_credential().await? else {
            return Ok(None);
        };

        if !umbrella.is_expired() {
            return Ok(Some((umbrella.umbrella_id, umbrella.access_token)));
        }

        match self.connector.refresh_token(&umbrella.refresh_token).await {
            Ok(grant) => {
                // The platform may restate the umbrella id on refresh; prefer it
                let umbrella_id = grant.company_id.clone().unwrap_or(umbrella.umbrella_id);
                self.persist_umbrella_grant(&umbrella_id, &grant).await?;
                info!(umbrella_id, "Refreshed expired umbrella credential");
                Ok(Some((umbrella_id, grant.access_token)))
            }
            Err(e) => {
                warn!(error = %e, "Umbrella refresh rejected");
                Ok(None)
            }
        }
    }

    /// Persist a grant as the credential for a tenant (last write wins)
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub async fn persist_tenant_grant(&self, tenant_id: &str, grant: &TokenGrant) -> AppResult<()> {
        let credential = TenantCredential {
            tenant_id: tenant_id.to_owned(),
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            expires_at: grant.expires_at,
            obtained_at: Utc::now(),
        };
        self.database.upsert_tenant_credential(&credential).await
    }

    /// Persist a grant as the umbrella credential, replacing any prior one
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub async fn persist_umbrella_grant(
        &self,
        umbrella_id: &str,
        grant: &TokenGrant,
    ) -> AppResult<()> {
        let credential = UmbrellaCredential {
            umbrella_id: umbrella_id.to_owned(),
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            expires_at: grant.expires_at,
        };
        self.database.upsert_umbrella_credential(&credential).await
    }

    /// The stored tenant credential, without refresh side effects
    ///
    /// # Errors
    /// Returns an error if the read fails
    pub async fn stored_tenant_credential(
        &self,
        tenant_id: &str,
    ) -> AppResult<Option<TenantCredential>> {
        self.database.tenant_credential(tenant_id).await
    }

    /// The stored umbrella credential, without refresh side effects
    ///
    /// # Errors
    /// Returns an error if the read fails
    pub async fn stored_umbrella_credential(&self) -> AppResult<Option<UmbrellaCredential>> {
        self.database.umbrella_credential().await
    }
}

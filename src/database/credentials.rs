// ABOUTME: Credential persistence with encrypt-on-write, decrypt-on-read token columns
// ABOUTME: Tenant rows are last-write-wins upserts; the umbrella table holds at most one row
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::{Database, EncryptionHelper};
use crate::errors::{AppError, AppResult};
use crate::models::{EncryptedToken, TenantCredential, UmbrellaCredential};
use sqlx::Row;

impl Database {
    /// Load the stored credential for a tenant, decrypting token columns
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decrypted
    pub async fn tenant_credential(&self, tenant_id: &str) -> AppResult<Option<TenantCredential>> {
        let row = sqlx::query(
            r"
            SELECT access_token, refresh_token, expires_at, obtained_at
            FROM tenant_credentials WHERE tenant_id = $1
            ",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to query tenant credential: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let encrypted = EncryptedToken {
            access_token: row.get::<String, _>("access_token"),
            refresh_token: row.get::<String, _>("refresh_token"),
        };
        let decrypted = encrypted.decrypt(self.encryption_key())?;

        let expires_at = row.get::<i64, _>("expires_at");
        let obtained_at = row.get::<i64, _>("obtained_at");

        Ok(Some(TenantCredential {
            tenant_id: tenant_id.to_owned(),
            access_token: decrypted.access_token,
            refresh_token: decrypted.refresh_token,
            expires_at: chrono::DateTime::from_timestamp(expires_at, 0)
                .ok_or_else(|| AppError::internal(format!("Invalid timestamp: {expires_at}")))?,
            obtained_at: chrono::DateTime::from_timestamp(obtained_at, 0)
                .ok_or_else(|| AppError::internal(format!("Invalid timestamp: {obtained_at}")))?,
        }))
    }

    /// Store or replace the credential for a tenant (last write wins)
    ///
    /// # Errors
    /// Returns an error if encryption fails or the write fails
    pub async fn upsert_tenant_credential(&self, credential: &TenantCredential) -> AppResult<()> {
        let encrypted = EncryptedToken::new(
            &credential.access_token,
            &credential.refresh_token,
            self.encryption_key(),
        )?;

        sqlx::query(
            r"
            INSERT INTO tenant_credentials (tenant_id, access_token, refresh_token, expires_at, obtained_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(tenant_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                obtained_at = excluded.obtained_at
            ",
        )
        .bind(&credential.tenant_id)
        .bind(&encrypted.access_token)
        .bind(&encrypted.refresh_token)
        .bind(credential.expires_at.timestamp())
        .bind(credential.obtained_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to upsert tenant credential: {e}")))?;

        Ok(())
    }

    /// Load the umbrella credential, if one has been stored
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decrypted
    pub async fn umbrella_credential(&self) -> AppResult<Option<UmbrellaCredential>> {
        let row = sqlx::query(
            r"
            SELECT umbrella_id, access_token, refresh_token, expires_at
            FROM umbrella_credentials LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to query umbrella credential: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let encrypted = EncryptedToken {
            access_token: row.get::<String, _>("access_token"),
            refresh_token: row.get::<String, _>("refresh_token"),
        };
        let decrypted = encrypted.decrypt(self.encryption_key())?;

        let expires_at = row.get::<i64, _>("expires_at");

        Ok(Some(UmbrellaCredential {
            umbrella_id: row.get::<String, _>("umbrella_id"),
            access_token: decrypted.access_token,
            refresh_token: decrypted.refresh_token,
            expires_at: chrono::DateTime::from_timestamp(expires_at, 0)
                .ok_or_else(|| AppError::internal(format!("Invalid timestamp: {expires_at}")))?,
        }))
    }

    /// Replace the umbrella credential; at most one row survives the write
    ///
    /// # Errors
    /// Returns an error if encryption fails or a write fails
    pub async fn upsert_umbrella_credential(&self, credential: &UmbrellaCredential) -> AppResult<()> {
        let encrypted = EncryptedToken::new(
            &credential.access_token,
            &credential.refresh_token,
            self.encryption_key(),
        )?;

        // A failed insert after the delete leaves the table empty, which reads
        // back as "no umbrella credential" rather than a stale one
        sqlx::query("DELETE FROM umbrella_credentials")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("Failed to clear umbrella credential: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO umbrella_credentials (umbrella_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&credential.umbrella_id)
        .bind(&encrypted.access_token)
        .bind(&encrypted.refresh_token)
        .bind(credential.expires_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage(format!("Failed to store umbrella credential: {e}")))?;

        Ok(())
    }
}

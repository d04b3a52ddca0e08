// ABOUTME: SQLite-backed persistence for tenant and umbrella credentials
// ABOUTME: Owns the connection pool, schema migrations, and the at-rest encryption key
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Database Management
//!
//! Connection pool and schema for the credential store. Token columns are
//! sealed with AES-256-GCM before they reach a row; see
//! [`crate::models::EncryptedToken`].

mod credentials;

use anyhow::Result;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Database manager for credential storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    encryption_key: Vec<u8>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a
    /// migration statement fails
    pub async fn new(database_url: &str, encryption_key: Vec<u8>) -> Result<Self> {
        // Ensure SQLite creates the database file if it doesn't exist.
        // In-memory databases and URLs that already carry options are left alone.
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        let pool = SqlitePool::connect(&connection_options).await?;

        let db = Self {
            pool,
            encryption_key,
        };

        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    /// Returns an error if a migration statement fails
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_credentials().await?;
        Ok(())
    }

    /// Create credential tables
    async fn migrate_credentials(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tenant_credentials (
                tenant_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                obtained_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tenant_credentials_expires_at ON tenant_credentials(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        // Singleton table: writers replace the whole contents
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS umbrella_credentials (
                umbrella_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Encryption helper trait for token column operations
pub(crate) trait EncryptionHelper {
    fn encryption_key(&self) -> &[u8];
}

impl EncryptionHelper for Database {
    fn encryption_key(&self) -> &[u8] {
        &self.encryption_key
    }
}

/// Generate a secure encryption key (32 bytes for AES-256)
#[must_use]
pub fn generate_encryption_key() -> [u8; 32] {
    use ring::rand::{SecureRandom, SystemRandom};
    let mut key = [0u8; 32];
    // SystemRandom only fails if the OS entropy source is unavailable,
    // in which case nothing in this process can be trusted anyway
    if SystemRandom::new().fill(&mut key).is_err() {
        tracing::warn!("system CSPRNG unavailable; key generation degraded");
    }
    key
}

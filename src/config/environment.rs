// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, secret loading, and runtime configuration parsing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Environment-based configuration management for production deployment

use crate::constants::{defaults, routes, time};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use std::env;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// AES-256-GCM key length for credential encryption at rest
pub const ENCRYPTION_KEY_LEN: usize = 32;
/// HMAC secret length for session token signing
pub const SESSION_SECRET_LEN: usize = 64;

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite { path: PathBuf },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite:").unwrap_or(s);
        if path_str == ":memory:" {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::parse_url(defaults::DATABASE_URL)
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Secret material loaded from the environment (or generated ephemerally).
/// Zeroized on drop; never printed.
#[derive(Clone)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    /// Wrap raw bytes
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Decode from base64
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not valid base64
    pub fn from_base64(raw: &str) -> Result<Self> {
        let bytes = BASE64.decode(raw.trim()).context("invalid base64")?;
        Ok(Self::new(bytes))
    }

    /// Generate `len` random bytes from the system CSPRNG
    #[must_use]
    pub fn generate(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        // SystemRandom only fails if the OS entropy source is unavailable,
        // in which case nothing in this process can be trusted anyway
        if SystemRandom::new().fill(&mut bytes).is_err() {
            warn!("system CSPRNG unavailable; secret generation degraded");
        }
        Self(Zeroizing::new(bytes))
    }

    /// Access the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(len={}, [REDACTED])", self.0.len())
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Externally visible base URL of this deployment, when configured
    pub base_url: Option<String>,
    /// Deployment environment
    pub environment: Environment,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Session token configuration
    pub session: SessionConfig,
    /// Identity-provider (platform) configuration
    pub platform: PlatformConfig,
    /// Access gate configuration
    pub gate: GateConfig,
    /// Landing path the OAuth callback redirects to
    pub landing_path: String,
    /// Expose the read-only credential preview endpoint
    pub expose_token_debug: bool,
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (SQLite path or `:memory:`)
    pub url: DatabaseUrl,
    /// AES-256-GCM key for credential encryption at rest
    pub encryption_key: SecretBytes,
}

/// Session token settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMAC secret for session token signing
    pub secret: SecretBytes,
    /// Session token lifetime in hours
    pub ttl_hours: i64,
}

/// Identity-provider settings. All endpoint/credential fields are optional:
/// a deployment without them boots fine, and the install flow reports
/// `config_missing` when exercised.
#[derive(Clone)]
pub struct PlatformConfig {
    /// OAuth client id issued by the platform
    pub client_id: Option<String>,
    /// OAuth client secret issued by the platform
    pub client_secret: Option<String>,
    /// Provider authorize endpoint
    pub authorize_url: Option<String>,
    /// Provider code-exchange / refresh endpoint
    pub token_url: Option<String>,
    /// Provider umbrella-scoped tenant-token mint endpoint
    pub tenant_token_url: Option<String>,
    /// Scopes requested at Authorize
    pub scopes: Vec<String>,
    /// Base URL the provider redirects back to (callback path is appended)
    pub redirect_base: Option<String>,
    /// Host of the platform's own UI, for embed-referrer heuristics
    pub ui_host: Option<String>,
}

impl PlatformConfig {
    /// Scopes joined the way the authorize URL wants them
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Absolute callback URL registered with the platform, when derivable
    #[must_use]
    pub fn redirect_uri(&self) -> Option<String> {
        self.redirect_base.as_deref().map(|base| {
            format!(
                "{}{}",
                base.trim_end_matches('/'),
                crate::constants::routes::OAUTH_CALLBACK
            )
        })
    }
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("tenant_token_url", &self.tenant_token_url)
            .field("scopes", &self.scopes)
            .field("redirect_base", &self.redirect_base)
            .field("ui_host", &self.ui_host)
            .finish()
    }
}

/// Access gate settings
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Operator username for HTTP Basic authentication
    pub operator_username: String,
    /// bcrypt hash of the operator password; operator auth is disabled when unset
    pub operator_password_hash: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error on malformed values, or on missing secrets in
    /// production (development generates ephemeral ones)
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let environment =
            Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development"));

        let config = Self {
            http_port: env_var_or("HTTP_PORT", &defaults::HTTP_PORT.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            base_url: env::var("BASE_URL").ok(),
            environment,
            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", defaults::DATABASE_URL)),
                encryption_key: load_secret(
                    "TOKEN_ENCRYPTION_KEY",
                    ENCRYPTION_KEY_LEN,
                    environment,
                )?,
            },
            session: SessionConfig {
                secret: load_secret("SESSION_SECRET", SESSION_SECRET_LEN, environment)?,
                ttl_hours: env_var_or("SESSION_TTL_HOURS", &time::SESSION_TTL_HOURS.to_string())
                    .parse()
                    .context("Invalid SESSION_TTL_HOURS value")?,
            },
            platform: PlatformConfig {
                client_id: env::var("PLATFORM_CLIENT_ID").ok(),
                client_secret: env::var("PLATFORM_CLIENT_SECRET").ok(),
                authorize_url: env::var("PLATFORM_AUTHORIZE_URL").ok(),
                token_url: env::var("PLATFORM_TOKEN_URL").ok(),
                tenant_token_url: env::var("PLATFORM_TENANT_TOKEN_URL").ok(),
                scopes: parse_scopes(&env_var_or("PLATFORM_SCOPES", "")),
                redirect_base: env::var("PLATFORM_REDIRECT_BASE")
                    .ok()
                    .or_else(|| env::var("BASE_URL").ok()),
                ui_host: env::var("PLATFORM_UI_HOST").ok(),
            },
            gate: GateConfig {
                operator_username: env_var_or("OPERATOR_USERNAME", "operator"),
                operator_password_hash: env::var("OPERATOR_PASSWORD_HASH").ok(),
            },
            landing_path: env_var_or("LANDING_PATH", routes::DEFAULT_LANDING),
            expose_token_debug: env_var_or("EXPOSE_TOKEN_DEBUG", "false")
                .parse()
                .context("Invalid EXPOSE_TOKEN_DEBUG value")?,
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error on values no deployment can run with
    pub fn validate(&self) -> Result<()> {
        if self.session.ttl_hours <= 0 {
            return Err(anyhow::anyhow!("SESSION_TTL_HOURS must be positive"));
        }

        if self.database.encryption_key.len() != ENCRYPTION_KEY_LEN {
            return Err(anyhow::anyhow!(
                "TOKEN_ENCRYPTION_KEY must decode to exactly {ENCRYPTION_KEY_LEN} bytes"
            ));
        }

        if !self.landing_path.starts_with('/') {
            return Err(anyhow::anyhow!("LANDING_PATH must be an absolute path"));
        }

        // Missing platform settings are not fatal here: the install flow
        // reports config_missing when it is actually exercised
        if self.platform.client_id.is_none() || self.platform.client_secret.is_none() {
            warn!("Platform OAuth client is not configured; install flow will fail with config_missing");
        }

        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Moorgate Configuration:\n\
             - HTTP Port: {}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Platform OAuth: {}\n\
             - Umbrella Mint Endpoint: {}\n\
             - Operator Auth: {}\n\
             - Landing Path: {}\n\
             - Token Debug Endpoint: {}",
            self.http_port,
            self.environment,
            if self.database.url.is_memory() {
                "SQLite (memory)"
            } else {
                "SQLite"
            },
            if self.platform.client_id.is_some() && self.platform.client_secret.is_some() {
                "Configured"
            } else {
                "Not configured"
            },
            if self.platform.tenant_token_url.is_some() {
                "Configured"
            } else {
                "Not configured"
            },
            if self.gate.operator_password_hash.is_some() {
                "Enabled"
            } else {
                "Disabled"
            },
            self.landing_path,
            if self.expose_token_debug {
                "Exposed"
            } else {
                "Hidden"
            },
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Load a base64 secret from the environment. Development generates an
/// ephemeral replacement when the variable is unset; production refuses to
/// start without it.
fn load_secret(var: &str, len: usize, environment: Environment) -> Result<SecretBytes> {
    match env::var(var) {
        Ok(raw) => SecretBytes::from_base64(&raw)
            .with_context(|| format!("{var} is not valid base64")),
        Err(_) if environment.is_production() => {
            Err(anyhow::anyhow!("{var} is required in production"))
        }
        Err(_) => {
            warn!(
                "{var} not set; generated an ephemeral value \
                 (sessions and stored credentials will not survive a restart)"
            );
            Ok(SecretBytes::generate(len))
        }
    }
}

/// Parse comma-separated scopes
fn parse_scopes(scopes_str: &str) -> Vec<String> {
    scopes_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("prod"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("nonsense"),
            Environment::Development
        );
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_database_url_parsing() {
        assert!(DatabaseUrl::parse_url("sqlite::memory:").is_memory());
        let file = DatabaseUrl::parse_url("sqlite:data/moorgate.db?mode=rwc");
        assert!(!file.is_memory());
        assert!(file.to_connection_string().starts_with("sqlite:"));
    }

    #[test]
    fn test_secret_bytes_roundtrip() {
        let secret = SecretBytes::generate(32);
        assert_eq!(secret.len(), 32);

        let encoded = BASE64.encode(secret.as_bytes());
        let decoded = SecretBytes::from_base64(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), secret.as_bytes());
    }

    #[test]
    fn test_secret_bytes_debug_is_redacted() {
        let secret = SecretBytes::new(b"super-secret".to_vec());
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_parse_scopes() {
        assert_eq!(
            parse_scopes("contacts.readonly, locations.readonly"),
            vec!["contacts.readonly".to_owned(), "locations.readonly".to_owned()]
        );
        assert!(parse_scopes("").is_empty());
    }
}

// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Environment-variable driven; secrets loaded or generated at startup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Configuration module
//!
//! Centralized configuration for all components of the engine:
//!
//! - **Environment**: server configuration from environment variables
//! - **Secrets**: base64 env secrets with ephemeral development fallback

/// Environment and server configuration
pub mod environment;

pub use environment::{
    DatabaseConfig, DatabaseUrl, Environment, GateConfig, PlatformConfig, SecretBytes,
    ServerConfig, SessionConfig,
};

// ABOUTME: Main library entry point for the Moorgate credential engine
// ABOUTME: Multi-tenant OAuth install flow, credential storage, and session resolution
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Moorgate
//!
//! A multi-tenant OAuth credential and session resolution engine. One
//! deployment serves many tenants of a third-party platform: it walks
//! each tenant through the platform's OAuth install flow, stores the
//! resulting credentials encrypted at rest, keeps them fresh, and
//! resolves "which tenant is this request acting for, and with what
//! access token" on every inbound call.
//!
//! ## Architecture
//!
//! - **oauth**: install flow orchestration (authorize redirect, callback,
//!   install session store, platform connector)
//! - **credentials**: tenant/umbrella credential lifecycle over the store
//! - **auth**: stateless signed session tokens for browsers
//! - **resolver**: query/header/session tenant resolution with a strict
//!   precedence order
//! - **gate**: request authentication strategies in front of `/api` and
//!   debug surfaces
//! - **database**: SQLite storage with AES-256-GCM encryption at rest
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use moorgate::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = ServerConfig::from_env()?;
//!
//!     println!("Moorgate configured with port: HTTP={}", config.http_port);
//!
//!     Ok(())
//! }
//! ```

/// Session token mint and verification (stateless, signed)
pub mod auth;

/// Configuration management from environment variables
pub mod config;

/// Domain constants grouped by concern
pub mod constants;

/// Tenant and umbrella credential lifecycle
pub mod credentials;

/// Encrypted SQLite storage
pub mod database;

/// Unified error type and machine-readable error codes
pub mod errors;

/// Request authentication strategies and gate middleware
pub mod gate;

/// Structured logging initialization
pub mod logging;

/// Core data types shared across modules
pub mod models;

/// OAuth install flow: authorize, callback, install sessions, connector
pub mod oauth;

/// Tenant identification and credential resolution per request
pub mod resolver;

/// HTTP route modules
pub mod routes;

/// Server state, router assembly, and serve loop
pub mod server;

/// Shared helpers (cookies, HTML escaping, outbound HTTP client)
pub mod utils;

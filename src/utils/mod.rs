// ABOUTME: Utility modules for common functionality across the application
// ABOUTME: Contains shared helpers for cookies and HTTP client construction
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Cookie parsing and construction helpers
pub mod cookies;
/// HTML escaping for server-rendered pages
pub mod html;
/// HTTP client configuration and helpers
pub mod http_client;

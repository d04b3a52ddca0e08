// ABOUTME: HTML escaping utilities to prevent XSS in server-rendered pages
// ABOUTME: Attribute-safe escaping for values injected into the landing and login pages
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Escape a string for safe insertion into HTML text or attribute values.
///
/// Replaces the five HTML-special characters (`&`, `<`, `>`, `"`, `'`)
/// with their entities. Landing-page query parameters are attacker
/// influenced, so everything rendered into the page goes through here.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(ch),
        }
    }
    output
}

//! Bearer credential extraction across transport fallbacks.
//!
//! Reverse proxies and hosting layers strip or rename the standard
//! `Authorization` header often enough that the token is accepted from a
//! fixed list of fallbacks, in priority order, stopping at the first
//! non-empty hit.

use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION, header::COOKIE};
use std::collections::HashMap;

/// Renamed copies of the Authorization header set by intermediaries.
const FORWARDED_AUTHORIZATION_HEADERS: [&str; 2] =
    ["x-forwarded-authorization", "x-original-authorization"];
/// Carries the raw token for environments that strip Authorization entirely.
const RAW_TOKEN_HEADER: &str = "x-auth-token";
const TOKEN_COOKIE: &str = "access_token";
const TOKEN_QUERY_PARAM: &str = "access_token";

/// Locate the caller's presented token, trimmed, or `None`.
#[must_use]
pub fn extract_token(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    if let Some(token) = headers.get(AUTHORIZATION).and_then(bearer_value) {
        return Some(token);
    }

    for name in FORWARDED_AUTHORIZATION_HEADERS {
        if let Some(token) = headers.get(name).and_then(bearer_value) {
            return Some(token);
        }
    }

    if let Some(token) = headers
        .get(RAW_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Some(token.to_string());
    }

    if let Some(token) = cookie_value(headers, TOKEN_COOKIE) {
        return Some(token);
    }

    query
        .get(TOKEN_QUERY_PARAM)
        .map(|value| value.trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Parse `Bearer <token>` with a case-insensitive scheme.
fn bearer_value(value: &HeaderValue) -> Option<String> {
    let value = value.to_str().ok()?.trim();
    let mut parts = value.splitn(2, char::is_whitespace);
    let scheme = parts.next()?;
    let token = parts.next()?.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

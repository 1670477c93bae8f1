//! Correlation cookie — binds a later enrichment report to its click record.
//!
//! The token value is the record identifier itself: 128 random bits, so
//! possession of a valid token is the only authentication the report path
//! needs. The cookie is script-inaccessible and same-site only, with a short
//! absolute lifetime bounding exposure.

use axum::http::{HeaderMap, header};

/// Cookie name carrying the click identifier.
pub const COOKIE_NAME: &str = "lt_click";

/// Build the `Set-Cookie` value for a freshly created record.
pub fn issue(id: &str, ttl_secs: u64) -> String {
  format!("{COOKIE_NAME}={id}; Max-Age={ttl_secs}; Path=/; HttpOnly; SameSite=Strict")
}

/// Extract the correlation token from the request's Cookie header.
///
/// `None` when the header, the cookie, or its value is missing or empty.
pub fn from_headers(headers: &HeaderMap) -> Option<String> {
  let raw = headers.get(header::COOKIE)?.to_str().ok()?;
  raw
    .split(';')
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == COOKIE_NAME)
    .map(|(_, value)| value.to_owned())
    .filter(|v| !v.is_empty())
}

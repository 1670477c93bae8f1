//! Destination validation.
//!
//! The destination parameter is attacker-controlled; everything that is not
//! a plausible absolute `http(s)` URL collapses to the operator-configured
//! fallback. The result is safe to issue verbatim in a Location header.

use axum::http::Uri;

/// Maximum accepted destination length, counted in characters rather than
/// UTF-8 bytes so multi-byte input is not penalised before parsing.
pub const MAX_DEST_LEN: usize = 2048;

/// Validate `raw` into a redirect-safe destination.
///
/// Total and deterministic: any rejection returns `fallback` unchanged, and
/// an accepted URL is returned in its canonicalized (re-serialised) form.
pub fn validate_dest(raw: Option<&str>, fallback: &str) -> String {
  let Some(raw) = raw else {
    return fallback.to_owned();
  };
  if raw.chars().count() > MAX_DEST_LEN {
    return fallback.to_owned();
  }
  let Ok(uri) = raw.parse::<Uri>() else {
    return fallback.to_owned();
  };
  // Absolute URL only: a bare path or authority-less form is rejected.
  if uri.authority().is_none() {
    return fallback.to_owned();
  }
  match uri.scheme_str() {
    Some("http") | Some("https") => uri.to_string(),
    _ => fallback.to_owned(),
  }
}

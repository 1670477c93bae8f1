//! Click capture — the `GET /t` flow.
//!
//! received → validated → geolocated → persisted → presented. The
//! user-visible action (redirect or bait page) is never blocked by storage
//! or lookup problems; those degrade to a warning log.

use std::net::SocketAddr;

use axum::{
  extract::{ConnectInfo, Query, State, rejection::QueryRejection},
  http::{HeaderMap, StatusCode, header, request::Parts},
  response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use linktrap_core::{
  click::{BAIT_DEST, NewClick},
  store::ClickStore,
};

use crate::{AppState, dest, token};

/// Interactive bait page served in place of a redirect. Static asset; no
/// request data is ever interpolated into it.
const BAIT_PAGE: &str = include_str!("../assets/bait.html");

#[derive(Debug, Deserialize)]
pub struct CaptureParams {
  pub dest: Option<String>,
}

/// `GET /t?dest=<raw destination, or the bait sentinel>`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  params: Result<Query<CaptureParams>, QueryRejection>,
  parts: Parts,
) -> Response
where
  S: ClickStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  // received → validated. A query string the extractor cannot make sense of
  // (duplicated keys, broken encoding) counts as no destination at all; the
  // click is still recorded and answered with the fallback redirect rather
  // than a client error.
  let dest = match params {
    Ok(Query(p)) => p.dest,
    Err(e) => {
      tracing::debug!(error = %e, "unreadable capture query");
      None
    }
  };
  let bait = dest.as_deref() == Some(BAIT_DEST);
  let dest_url = if bait {
    BAIT_DEST.to_owned()
  } else {
    dest::validate_dest(dest.as_deref(), &state.config.fallback_url)
  };

  // validated → geolocated
  let headers = &parts.headers;
  let forwarded_for = header_string(headers, "x-forwarded-for");
  let peer = parts
    .extensions
    .get::<ConnectInfo<SocketAddr>>()
    .map(|c| c.0);
  let ip = client_ip(forwarded_for.as_deref(), peer);
  let location = ip.as_deref().and_then(|ip| state.geo.lookup(ip));

  // geolocated → persisted; best-effort relative to the user-facing action
  let click = NewClick {
    ip,
    forwarded_for,
    user_agent: header_string(headers, "user-agent"),
    accept_language: header_string(headers, "accept-language"),
    referrer: header_string(headers, "referer"),
    dest_url: dest_url.clone(),
    location,
  };
  let record = match state.store.record_click(click).await {
    Ok(r) => Some(r),
    Err(e) => {
      tracing::warn!(error = %e, "click insert failed, presenting anyway");
      None
    }
  };

  // persisted → presented
  if bait {
    // Without a persisted record there is nothing to correlate against, so
    // the page is served without a token.
    match record {
      Some(r) => (
        [(
          header::SET_COOKIE,
          token::issue(&r.id, state.config.cookie_ttl_secs),
        )],
        Html(BAIT_PAGE),
      )
        .into_response(),
      None => Html(BAIT_PAGE).into_response(),
    }
  } else {
    (StatusCode::FOUND, [(header::LOCATION, dest_url)]).into_response()
  }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned)
}

/// First entry of the forwarded chain if present, else the peer address.
fn client_ip(forwarded: Option<&str>, peer: Option<SocketAddr>) -> Option<String> {
  if let Some(chain) = forwarded {
    let first = chain.split(',').next().unwrap_or("").trim();
    if !first.is_empty() {
      return Some(first.to_owned());
    }
  }
  peer.map(|p| p.ip().to_string())
}

//! Read-only reporting surface.
//!
//! Both endpoints shape records with the best-available-coordinate logic
//! from `linktrap_core::coord` and never mutate state. Access control is an
//! optional shared secret checked before anything else.

use axum::{
  Json,
  extract::{Query, State},
  http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};

use linktrap_core::{click::ClickRecord, coord::best_coord, store::ClickStore};

use crate::{AppState, ServerConfig, error::ApiError};

/// Default page size when `limit` is missing or invalid.
pub const DEFAULT_LIMIT: u32 = 100;
/// Hard cap on page size.
pub const MAX_LIMIT: u32 = 1000;

/// Header carrying the optional read-surface shared secret.
pub const VIEW_KEY_HEADER: &str = "x-view-key";

// ─── Paging ──────────────────────────────────────────────────────────────────

/// Raw paging input. Strings, not numbers: non-numeric input must be
/// silently corrected rather than rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub limit:  Option<String>,
  pub offset: Option<String>,
}

/// Silently correct caller-supplied paging: non-positive or non-numeric
/// `limit` falls back to the default and anything above the cap is clamped;
/// negative or non-numeric `offset` becomes zero.
pub fn clamp_page(params: &PageParams) -> (u32, u32) {
  let limit = match params.limit.as_deref().and_then(|s| s.parse::<i64>().ok()) {
    Some(n) if n > 0 => n.min(i64::from(MAX_LIMIT)) as u32,
    _ => DEFAULT_LIMIT,
  };
  let offset = match params.offset.as_deref().and_then(|s| s.parse::<i64>().ok()) {
    Some(n) if n > 0 => n.min(i64::from(u32::MAX)) as u32,
    _ => 0,
  };
  (limit, offset)
}

// ─── Access check ────────────────────────────────────────────────────────────

fn check_view_key(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
  let Some(expected) = &config.view_key else {
    return Ok(());
  };
  let supplied = headers.get(VIEW_KEY_HEADER).and_then(|v| v.to_str().ok());
  if supplied == Some(expected.as_str()) {
    Ok(())
  } else {
    Err(ApiError::Unauthorized)
  }
}

// ─── Row shaping ─────────────────────────────────────────────────────────────

fn shape(record: &ClickRecord) -> Value {
  let coord = best_coord(record);
  json!({
    "id": &record.id,
    "created_at": &record.created_at,
    "ip": &record.ip,
    "dest_url": &record.dest_url,
    "country": record.location.as_ref().and_then(|l| l.country.as_deref()),
    "city": record.location.as_ref().and_then(|l| l.city.as_deref()),
    "source": coord.source,
    "lat": coord.lat,
    "lon": coord.lon,
    "accuracy": coord.accuracy,
    "consented": record.enrichment.as_ref().map(|e| e.consented),
  })
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `GET /api/latest` — the newest record's best coordinate, or JSON `null`.
pub async fn latest<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<Json<Value>, ApiError>
where
  S: ClickStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  check_view_key(&headers, &state.config)?;

  let record = state
    .store
    .latest()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(record.as_ref().map(shape).unwrap_or(Value::Null)))
}

/// `GET /api/clicks?limit=<n>&offset=<n>` — newest first, corrected paging
/// echoed back.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError>
where
  S: ClickStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  check_view_key(&headers, &state.config)?;

  let (limit, offset) = clamp_page(&params);
  let records = state
    .store
    .list(limit, offset)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let rows: Vec<Value> = records.iter().map(shape).collect();
  Ok(Json(json!({ "limit": limit, "offset": offset, "clicks": rows })))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn page(limit: Option<&str>, offset: Option<&str>) -> (u32, u32) {
    clamp_page(&PageParams {
      limit:  limit.map(str::to_owned),
      offset: offset.map(str::to_owned),
    })
  }

  #[test]
  fn limit_is_clamped_to_the_cap() {
    assert_eq!(page(Some("5000"), None), (1000, 0));
    assert_eq!(page(Some("1000"), None), (1000, 0));
    assert_eq!(page(Some("5"), None), (5, 0));
  }

  #[test]
  fn bad_limit_becomes_default() {
    assert_eq!(page(Some("-3"), None), (100, 0));
    assert_eq!(page(Some("0"), None), (100, 0));
    assert_eq!(page(Some("many"), None), (100, 0));
    assert_eq!(page(None, None), (100, 0));
  }

  #[test]
  fn bad_offset_becomes_zero() {
    assert_eq!(page(None, Some("-1")), (100, 0));
    assert_eq!(page(None, Some("soon")), (100, 0));
    assert_eq!(page(None, Some("25")), (100, 25));
  }
}

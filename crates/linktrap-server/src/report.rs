//! Enrichment report — the `POST /report` flow.

use axum::{Json, extract::State, http::HeaderMap};
use chrono::Utc;
use serde_json::{Value, json};

use linktrap_core::{report::RawReport, store::ClickStore};

use crate::{AppState, error::ApiError, token};

/// `POST /report` — body per [`RawReport`], token via the correlation cookie.
///
/// A missing token is the caller's error; a well-formed token that matches
/// no record still reports success, so the response never leaks whether a
/// given identifier exists.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Json(body): Json<RawReport>,
) -> Result<Json<Value>, ApiError>
where
  S: ClickStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Some(id) = token::from_headers(&headers) else {
    return Err(ApiError::BadRequest("missing correlation token".into()));
  };

  let enrichment = body.normalize(Utc::now());
  let affected = state
    .store
    .apply_enrichment(&id, enrichment)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  tracing::debug!(rows = affected, "enrichment applied");
  Ok(Json(json!({ "ok": true })))
}

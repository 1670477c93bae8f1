//! HTTP layer for linktrap.
//!
//! Exposes an axum [`Router`] over any [`ClickStore`]: the capture endpoint
//! (redirect or interactive bait page), the enrichment report endpoint, and
//! the read-only reporting surface. TLS and deployment are the caller's
//! responsibility.

pub mod capture;
pub mod dest;
pub mod error;
pub mod reads;
pub mod report;
pub mod token;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;

use linktrap_core::{geo::GeoLookup, store::ClickStore};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_cookie_ttl() -> u64 {
  300
}

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// Destination issued whenever the requested one fails validation.
  pub fallback_url:    String,
  /// JSON file backing the approximate-location table; omit to disable
  /// lookups entirely.
  pub geo_table_path:  Option<PathBuf>,
  /// Correlation cookie lifetime, seconds.
  #[serde(default = "default_cookie_ttl")]
  pub cookie_ttl_secs: u64,
  /// Shared secret for the read surface; omit to leave it open.
  pub view_key:        Option<String>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ClickStore> {
  pub store:  Arc<S>,
  pub geo:    Arc<dyn GeoLookup>,
  pub config: Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the click capture server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ClickStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/t", get(capture::handler::<S>))
    .route("/report", post(report::handler::<S>))
    .route("/api/latest", get(reads::latest::<S>))
    .route("/api/clicks", get(reads::list::<S>))
    .route("/healthz", get(|| async { "ok" }))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use linktrap_core::{
    click::{BAIT_DEST, ClickRecord, Enrichment, NewClick},
    geo::GeoTable,
    store::ClickStore,
  };
  use linktrap_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const GEO_TABLE: &str = r#"[{
    "network": "203.0.113.0/24",
    "country": "AU",
    "region": ["New South Wales", "NSW"],
    "city": "Sydney",
    "ll": [-33.86, 151.2],
    "accuracy_km": 20.0
  }]"#;

  fn make_config(view_key: Option<&str>) -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
      host:            "127.0.0.1".to_string(),
      port:            0,
      store_path:      PathBuf::from(":memory:"),
      fallback_url:    "https://fallback.example/".to_string(),
      geo_table_path:  None,
      cookie_ttl_secs: 300,
      view_key:        view_key.map(str::to_owned),
    })
  }

  async fn make_state(view_key: Option<&str>) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      geo:    Arc::new(GeoTable::from_json(GEO_TABLE).unwrap()),
      config: make_config(view_key),
    }
  }

  /// Store whose writes always fail, for exercising the best-effort capture
  /// path.
  #[derive(Clone)]
  struct FailingStore;

  impl ClickStore for FailingStore {
    type Error = std::io::Error;

    async fn record_click(
      &self,
      _input: NewClick,
    ) -> Result<ClickRecord, Self::Error> {
      Err(std::io::Error::other("disk full"))
    }

    async fn apply_enrichment(
      &self,
      _id: &str,
      _enrichment: Enrichment,
    ) -> Result<u64, Self::Error> {
      Err(std::io::Error::other("disk full"))
    }

    async fn latest(&self) -> Result<Option<ClickRecord>, Self::Error> {
      Err(std::io::Error::other("disk full"))
    }

    async fn list(
      &self,
      _limit: u32,
      _offset: u32,
    ) -> Result<Vec<ClickRecord>, Self::Error> {
      Err(std::io::Error::other("disk full"))
    }
  }

  fn failing_state() -> AppState<FailingStore> {
    AppState {
      store:  Arc::new(FailingStore),
      geo:    Arc::new(GeoTable::empty()),
      config: make_config(None),
    }
  }

  async fn oneshot<S>(
    state:   AppState<S>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> axum::response::Response
  where
    S: ClickStore + Clone + Send + Sync + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
  {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── Capture ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn capture_redirects_and_persists_the_destination() {
    let state = make_state(None).await;
    let resp = oneshot(
      state.clone(),
      "GET",
      "/t?dest=https://example.com/x",
      vec![],
      "",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers().get(header::LOCATION).unwrap();
    assert_eq!(location, "https://example.com/x");

    let record = state.store.latest().await.unwrap().unwrap();
    assert_eq!(record.dest_url, "https://example.com/x");
    assert!(record.enrichment.is_none());
  }

  #[tokio::test]
  async fn capture_with_unsafe_destination_redirects_to_fallback() {
    let state = make_state(None).await;
    let resp = oneshot(
      state.clone(),
      "GET",
      "/t?dest=javascript:alert(1)",
      vec![],
      "",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers().get(header::LOCATION).unwrap();
    assert_eq!(location, "https://fallback.example/");
    // The fallback, not the raw input, is what gets persisted.
    let record = state.store.latest().await.unwrap().unwrap();
    assert_eq!(record.dest_url, "https://fallback.example/");
  }

  #[tokio::test]
  async fn capture_without_destination_redirects_to_fallback() {
    let state = make_state(None).await;
    let resp = oneshot(state, "GET", "/t", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
      resp.headers().get(header::LOCATION).unwrap(),
      "https://fallback.example/"
    );
  }

  #[tokio::test]
  async fn bait_capture_serves_page_and_binds_cookie_to_record() {
    let state = make_state(None).await;
    let resp = oneshot(
      state.clone(),
      "GET",
      &format!("/t?dest={BAIT_DEST}"),
      vec![],
      "",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
      .headers()
      .get(header::CONTENT_TYPE)
      .unwrap()
      .to_str()
      .unwrap();
    assert!(content_type.contains("text/html"), "Content-Type: {content_type}");

    let cookie = resp
      .headers()
      .get(header::SET_COOKIE)
      .unwrap()
      .to_str()
      .unwrap()
      .to_string();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));

    let record = state.store.latest().await.unwrap().unwrap();
    // No literal destination is stored in bait mode, and the cookie value
    // is exactly the record identifier.
    assert_eq!(record.dest_url, BAIT_DEST);
    assert!(cookie.starts_with(&format!("lt_click={}", record.id)));
  }

  #[tokio::test]
  async fn capture_with_duplicated_destination_param_still_redirects() {
    let state = make_state(None).await;
    let resp = oneshot(
      state.clone(),
      "GET",
      "/t?dest=https://a.example/&dest=https://b.example/",
      vec![],
      "",
    )
    .await;

    // An unreadable query never surfaces as a client error; it degrades to
    // the fallback redirect and the click is still captured.
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
      resp.headers().get(header::LOCATION).unwrap(),
      "https://fallback.example/"
    );
    let record = state.store.latest().await.unwrap().unwrap();
    assert_eq!(record.dest_url, "https://fallback.example/");
  }

  #[tokio::test]
  async fn capture_redirects_even_when_the_insert_fails() {
    let resp = oneshot(
      failing_state(),
      "GET",
      "/t?dest=https://example.com/x",
      vec![],
      "",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
      resp.headers().get(header::LOCATION).unwrap(),
      "https://example.com/x"
    );
  }

  #[tokio::test]
  async fn bait_capture_without_a_record_serves_the_page_cookieless() {
    let resp = oneshot(
      failing_state(),
      "GET",
      &format!("/t?dest={BAIT_DEST}"),
      vec![],
      "",
    )
    .await;

    // With nothing persisted there is nothing to correlate against, so no
    // token is issued, but the page itself still comes back.
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
  }

  #[tokio::test]
  async fn capture_resolves_approximate_location_from_forwarded_header() {
    let state = make_state(None).await;
    oneshot(
      state.clone(),
      "GET",
      "/t?dest=https://example.com/",
      vec![(
        header::HeaderName::from_static("x-forwarded-for"),
        "203.0.113.9, 10.0.0.1",
      )],
      "",
    )
    .await;

    let record = state.store.latest().await.unwrap().unwrap();
    assert_eq!(record.ip.as_deref(), Some("203.0.113.9"));
    assert_eq!(record.forwarded_for.as_deref(), Some("203.0.113.9, 10.0.0.1"));
    let loc = record.location.unwrap();
    assert_eq!(loc.country.as_deref(), Some("AU"));
    assert_eq!(loc.region.as_deref(), Some("New South Wales,NSW"));
  }

  // ── Enrichment report ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn report_without_token_is_a_client_error() {
    let state = make_state(None).await;
    let resp = oneshot(
      state,
      "POST",
      "/report",
      vec![(header::CONTENT_TYPE, "application/json")],
      r#"{"lat": 1.0, "lon": 2.0}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn report_with_valid_token_enriches_the_record() {
    let state = make_state(None).await;
    oneshot(
      state.clone(),
      "GET",
      &format!("/t?dest={BAIT_DEST}"),
      vec![],
      "",
    )
    .await;
    let record = state.store.latest().await.unwrap().unwrap();

    let cookie = format!("lt_click={}", record.id);
    let body = json!({
      "lat": 10.5,
      "lon": 20.25,
      "accuracy": 5,
      "consented": true,
      "languages": ["en-US", "en"],
      "timezone": "Europe/Berlin"
    })
    .to_string();
    let resp = oneshot(
      state.clone(),
      "POST",
      "/report",
      vec![
        (header::CONTENT_TYPE, "application/json"),
        (header::COOKIE, cookie.as_str()),
      ],
      &body,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "ok": true }));

    let e = state
      .store
      .latest()
      .await
      .unwrap()
      .unwrap()
      .enrichment
      .unwrap();
    assert_eq!(e.precise_lat, Some(10.5));
    assert_eq!(e.precise_lon, Some(20.25));
    assert_eq!(e.accuracy_m, Some(5.0));
    assert!(e.consented);
    assert_eq!(e.languages.as_deref(), Some("en-US,en"));
    assert_eq!(e.timezone.as_deref(), Some("Europe/Berlin"));
  }

  #[tokio::test]
  async fn report_with_unknown_token_succeeds_without_touching_storage() {
    let state = make_state(None).await;
    oneshot(
      state.clone(),
      "GET",
      "/t?dest=https://example.com/",
      vec![],
      "",
    )
    .await;

    let cookie = format!("lt_click={}", "cd".repeat(16));
    let resp = oneshot(
      state.clone(),
      "POST",
      "/report",
      vec![
        (header::CONTENT_TYPE, "application/json"),
        (header::COOKIE, cookie.as_str()),
      ],
      r#"{"lat": 1.0, "lon": 2.0, "consented": true}"#,
    )
    .await;

    // Existence must not leak through differing responses.
    assert_eq!(resp.status(), StatusCode::OK);
    let record = state.store.latest().await.unwrap().unwrap();
    assert!(record.enrichment.is_none());
  }

  // ── Read surface ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn latest_on_empty_store_is_json_null() {
    let state = make_state(None).await;
    let resp = oneshot(state, "GET", "/api/latest", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, Value::Null);
  }

  #[tokio::test]
  async fn latest_prefers_browser_coordinates_once_enriched() {
    let state = make_state(None).await;
    oneshot(
      state.clone(),
      "GET",
      "/t?dest=https://example.com/",
      vec![(
        header::HeaderName::from_static("x-forwarded-for"),
        "203.0.113.9",
      )],
      "",
    )
    .await;

    // Before enrichment: IP-derived coordinate.
    let before =
      body_json(oneshot(state.clone(), "GET", "/api/latest", vec![], "").await)
        .await;
    assert_eq!(before["source"], "ip");
    assert_eq!(before["lat"], json!(-33.86));
    assert_eq!(before["lon"], json!(151.2));

    let record = state.store.latest().await.unwrap().unwrap();
    let cookie = format!("lt_click={}", record.id);
    oneshot(
      state.clone(),
      "POST",
      "/report",
      vec![
        (header::CONTENT_TYPE, "application/json"),
        (header::COOKIE, cookie.as_str()),
      ],
      r#"{"lat": 10.5, "lon": 20.25, "accuracy": 5, "consented": true}"#,
    )
    .await;

    let after =
      body_json(oneshot(state, "GET", "/api/latest", vec![], "").await).await;
    assert_eq!(after["source"], "browser");
    assert_eq!(after["lat"], json!(10.5));
    assert_eq!(after["lon"], json!(20.25));
    assert_eq!(after["accuracy"], json!(5.0));
  }

  #[tokio::test]
  async fn paged_list_echoes_corrected_paging() {
    let state = make_state(None).await;
    for i in 0..3 {
      oneshot(
        state.clone(),
        "GET",
        &format!("/t?dest=https://example.com/{i}"),
        vec![],
        "",
      )
      .await;
    }

    let clamped =
      body_json(oneshot(state.clone(), "GET", "/api/clicks?limit=5000", vec![], "").await)
        .await;
    assert_eq!(clamped["limit"], json!(1000));
    assert_eq!(clamped["offset"], json!(0));
    assert_eq!(clamped["clicks"].as_array().unwrap().len(), 3);
    // Newest first.
    assert_eq!(clamped["clicks"][0]["dest_url"], "https://example.com/2");

    let corrected =
      body_json(oneshot(state, "GET", "/api/clicks?limit=-3&offset=-7", vec![], "").await)
        .await;
    assert_eq!(corrected["limit"], json!(100));
    assert_eq!(corrected["offset"], json!(0));
  }

  #[tokio::test]
  async fn view_key_guards_the_read_surface() {
    let state = make_state(Some("letmesee")).await;

    let denied = oneshot(state.clone(), "GET", "/api/latest", vec![], "").await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = oneshot(
      state.clone(),
      "GET",
      "/api/latest",
      vec![(header::HeaderName::from_static("x-view-key"), "letmesee")],
      "",
    )
    .await;
    assert_eq!(allowed.status(), StatusCode::OK);

    // The capture path is not gated.
    let capture = oneshot(state, "GET", "/t?dest=https://example.com/", vec![], "").await;
    assert_eq!(capture.status(), StatusCode::FOUND);
  }

  #[tokio::test]
  async fn healthz_is_ok() {
    let state = make_state(None).await;
    let resp = oneshot(state, "GET", "/healthz", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }
}

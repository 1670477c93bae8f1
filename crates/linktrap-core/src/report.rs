//! Enrichment report normalization.
//!
//! The browser payload is loosely typed: every field is coerced individually
//! and falls back to absent on a type mismatch. Nothing here ever fails —
//! malformed input degrades to "unknown", not to an error.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::click::Enrichment;

/// Wire shape of an enrichment report. All fields are optional and
/// dynamically typed; absent fields deserialise to `Value::Null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawReport {
  pub lat:           Value,
  pub lon:           Value,
  /// Accuracy radius, metres.
  pub accuracy:      Value,
  /// Epoch milliseconds or an RFC 3339 string.
  pub timestamp:     Value,
  pub consented:     Value,
  pub platform:      Value,
  pub vendor:        Value,
  pub language:      Value,
  pub languages:     Value,
  pub timezone:      Value,
  pub cpu_cores:     Value,
  pub device_memory: Value,
  pub screen_w:      Value,
  pub screen_h:      Value,
  pub color_depth:   Value,
  pub do_not_track:  Value,
}

impl RawReport {
  /// Coerce every field, defaulting to absent on mismatch. `received_at`
  /// substitutes for a missing or malformed client timestamp.
  pub fn normalize(self, received_at: DateTime<Utc>) -> Enrichment {
    Enrichment {
      precise_lat:      self.lat.as_f64(),
      precise_lon:      self.lon.as_f64(),
      accuracy_m:       self.accuracy.as_f64(),
      client_ts:        as_timestamp(&self.timestamp).unwrap_or(received_at),
      consented:        truthy(&self.consented),
      platform:         as_string(&self.platform),
      vendor:           as_string(&self.vendor),
      language:         as_string(&self.language),
      languages:        as_joined_list(&self.languages),
      timezone:         as_string(&self.timezone),
      cpu_cores:        self.cpu_cores.as_i64(),
      device_memory_gb: self.device_memory.as_f64(),
      screen_w:         self.screen_w.as_i64(),
      screen_h:         self.screen_h.as_i64(),
      color_depth:      self.color_depth.as_i64(),
      do_not_track:     truthy(&self.do_not_track),
    }
  }
}

fn as_string(v: &Value) -> Option<String> {
  v.as_str().map(str::to_owned)
}

/// Client timestamp: epoch milliseconds or an RFC 3339 string.
fn as_timestamp(v: &Value) -> Option<DateTime<Utc>> {
  if let Some(ms) = v.as_i64() {
    return DateTime::from_timestamp_millis(ms);
  }
  v.as_str().and_then(|s| {
    DateTime::parse_from_rfc3339(s)
      .ok()
      .map(|dt| dt.with_timezone(&Utc))
  })
}

/// A list of strings, comma-joined. Non-list input is stored as absent.
fn as_joined_list(v: &Value) -> Option<String> {
  let list = v.as_array()?;
  Some(
    list
      .iter()
      .filter_map(Value::as_str)
      .collect::<Vec<_>>()
      .join(","),
  )
}

/// JavaScript-style truthiness for the flag fields.
fn truthy(v: &Value) -> bool {
  match v {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn parse(body: serde_json::Value) -> RawReport {
    serde_json::from_value(body).unwrap()
  }

  #[test]
  fn well_formed_report_round_trips() {
    let now = Utc::now();
    let e = parse(json!({
      "lat": 10.5,
      "lon": 20.25,
      "accuracy": 5,
      "consented": true,
      "platform": "Linux x86_64",
      "languages": ["en-US", "en", "de"],
      "cpu_cores": 8,
      "device_memory": 7.5,
      "screen_w": 1920,
      "screen_h": 1080,
      "color_depth": 24,
      "do_not_track": false
    }))
    .normalize(now);

    assert_eq!(e.precise_lat, Some(10.5));
    assert_eq!(e.precise_lon, Some(20.25));
    assert_eq!(e.accuracy_m, Some(5.0));
    assert!(e.consented);
    assert_eq!(e.platform.as_deref(), Some("Linux x86_64"));
    assert_eq!(e.languages.as_deref(), Some("en-US,en,de"));
    assert_eq!(e.cpu_cores, Some(8));
    assert_eq!(e.device_memory_gb, Some(7.5));
    assert_eq!(e.screen_w, Some(1920));
    assert!(!e.do_not_track);
    // No timestamp supplied: server receipt time stands in.
    assert_eq!(e.client_ts, now);
  }

  #[test]
  fn type_mismatches_become_absent() {
    let e = parse(json!({
      "lat": "not-a-number",
      "lon": [1, 2],
      "platform": 42,
      "languages": "en-US",
      "cpu_cores": "eight"
    }))
    .normalize(Utc::now());

    assert_eq!(e.precise_lat, None);
    assert_eq!(e.precise_lon, None);
    assert_eq!(e.platform, None);
    // Non-list languages input is absent, not a one-element list.
    assert_eq!(e.languages, None);
    assert_eq!(e.cpu_cores, None);
  }

  #[test]
  fn flags_follow_js_truthiness() {
    let now = Utc::now();
    assert!(parse(json!({ "consented": 1 })).normalize(now).consented);
    assert!(parse(json!({ "consented": "yes" })).normalize(now).consented);
    assert!(!parse(json!({ "consented": 0 })).normalize(now).consented);
    assert!(!parse(json!({ "consented": "" })).normalize(now).consented);
    assert!(!parse(json!({})).normalize(now).consented);
    assert!(parse(json!({ "do_not_track": true })).normalize(now).do_not_track);
  }

  #[test]
  fn epoch_millis_timestamp_is_decoded() {
    let e = parse(json!({ "timestamp": 1_700_000_000_000_i64 }))
      .normalize(Utc::now());
    assert_eq!(e.client_ts.timestamp_millis(), 1_700_000_000_000);
  }

  #[test]
  fn rfc3339_timestamp_is_decoded() {
    let e = parse(json!({ "timestamp": "2026-01-02T03:04:05Z" }))
      .normalize(Utc::now());
    assert_eq!(e.client_ts.to_rfc3339(), "2026-01-02T03:04:05+00:00");
  }

  #[test]
  fn malformed_timestamp_uses_receipt_time() {
    let now = Utc::now();
    let e = parse(json!({ "timestamp": "yesterday-ish" })).normalize(now);
    assert_eq!(e.client_ts, now);
  }
}

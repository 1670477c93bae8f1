//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Flags are stored as 0/1
//! integers. Coordinates are stored as REAL and never defaulted — NULL means
//! unknown, not zero.

use chrono::{DateTime, Utc};
use linktrap_core::{
  click::{ClickRecord, Enrichment},
  geo::ApproxLocation,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row type ────────────────────────────────────────────────────────────────

/// Raw values read directly from a `clicks` row, in schema column order.
pub struct RawClick {
  pub id:               String,
  pub created_at:       String,
  pub ip:               Option<String>,
  pub forwarded_for:    Option<String>,
  pub user_agent:       Option<String>,
  pub accept_language:  Option<String>,
  pub referrer:         Option<String>,
  pub dest_url:         String,
  pub country:          Option<String>,
  pub region:           Option<String>,
  pub city:             Option<String>,
  pub lat:              Option<f64>,
  pub lon:              Option<f64>,
  pub accuracy_km:      Option<f64>,
  pub precise_lat:      Option<f64>,
  pub precise_lon:      Option<f64>,
  pub accuracy_m:       Option<f64>,
  pub client_ts:        Option<String>,
  pub consented:        Option<bool>,
  pub platform:         Option<String>,
  pub vendor:           Option<String>,
  pub language:         Option<String>,
  pub languages:        Option<String>,
  pub timezone:         Option<String>,
  pub cpu_cores:        Option<i64>,
  pub device_memory_gb: Option<f64>,
  pub screen_w:         Option<i64>,
  pub screen_h:         Option<i64>,
  pub color_depth:      Option<i64>,
  pub do_not_track:     Option<bool>,
}

impl RawClick {
  pub fn into_record(self) -> Result<ClickRecord> {
    // Approximate location is written as a group at creation; any non-NULL
    // geo column marks a lookup hit.
    let location = if self.country.is_some()
      || self.region.is_some()
      || self.city.is_some()
      || self.lat.is_some()
      || self.lon.is_some()
      || self.accuracy_km.is_some()
    {
      Some(ApproxLocation {
        country:     self.country,
        region:      self.region,
        city:        self.city,
        lat:         self.lat,
        lon:         self.lon,
        accuracy_km: self.accuracy_km,
      })
    } else {
      None
    };

    // `client_ts` is set by every enrichment update (defaulted to receipt
    // time when the browser omits it), so it marks an applied report.
    let enrichment = match self.client_ts {
      Some(ts) => Some(Enrichment {
        precise_lat:      self.precise_lat,
        precise_lon:      self.precise_lon,
        accuracy_m:       self.accuracy_m,
        client_ts:        decode_dt(&ts)?,
        consented:        self.consented.unwrap_or(false),
        platform:         self.platform,
        vendor:           self.vendor,
        language:         self.language,
        languages:        self.languages,
        timezone:         self.timezone,
        cpu_cores:        self.cpu_cores,
        device_memory_gb: self.device_memory_gb,
        screen_w:         self.screen_w,
        screen_h:         self.screen_h,
        color_depth:      self.color_depth,
        do_not_track:     self.do_not_track.unwrap_or(false),
      }),
      None => None,
    };

    Ok(ClickRecord {
      id:              self.id,
      created_at:      decode_dt(&self.created_at)?,
      ip:              self.ip,
      forwarded_for:   self.forwarded_for,
      user_agent:      self.user_agent,
      accept_language: self.accept_language,
      referrer:        self.referrer,
      dest_url:        self.dest_url,
      location,
      enrichment,
    })
  }
}

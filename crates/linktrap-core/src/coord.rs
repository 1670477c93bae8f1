//! Best-available coordinate selection for the read surface.

use serde::Serialize;

use crate::click::ClickRecord;

/// Where a reported coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordSource {
  /// Precise browser-reported geolocation.
  Browser,
  /// Coarse IP-derived location.
  Ip,
}

/// A record's best-available coordinate.
#[derive(Debug, Clone, Serialize)]
pub struct BestCoord {
  pub source:   CoordSource,
  pub lat:      Option<f64>,
  pub lon:      Option<f64>,
  /// Metres for `browser`, kilometres for `ip`.
  pub accuracy: Option<f64>,
}

/// Select a record's best coordinate.
///
/// Precise enrichment wins only when both of its latitude and longitude are
/// present; otherwise the approximate pair is used, even when that is also
/// absent (then both fields are `None` with `source` still `ip`).
pub fn best_coord(record: &ClickRecord) -> BestCoord {
  if let Some(e) = &record.enrichment
    && let (Some(lat), Some(lon)) = (e.precise_lat, e.precise_lon)
  {
    return BestCoord {
      source:   CoordSource::Browser,
      lat:      Some(lat),
      lon:      Some(lon),
      accuracy: e.accuracy_m,
    };
  }

  let loc = record.location.as_ref();
  BestCoord {
    source:   CoordSource::Ip,
    lat:      loc.and_then(|l| l.lat),
    lon:      loc.and_then(|l| l.lon),
    accuracy: loc.and_then(|l| l.accuracy_km),
  }
}

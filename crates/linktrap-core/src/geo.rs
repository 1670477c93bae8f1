//! Approximate location derived from the IP address alone.
//!
//! The underlying lookup source is opaque behind [`GeoLookup`]. Misses,
//! empty input, and unparseable addresses are all "no location" — never an
//! error the caller has to handle.

use std::{net::Ipv4Addr, path::Path};

use serde::{Deserialize, Serialize};

use crate::Result;

// ─── Normalized record ───────────────────────────────────────────────────────

/// The fixed normalized shape every lookup hit is reduced to.
///
/// Missing sub-fields stay absent; "unknown" is never conflated with a zero
/// coordinate or an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproxLocation {
  pub country:     Option<String>,
  /// Single token, or a comma-joined list when the source provided several.
  pub region:      Option<String>,
  pub city:        Option<String>,
  pub lat:         Option<f64>,
  pub lon:         Option<f64>,
  /// Accuracy radius, kilometres.
  pub accuracy_km: Option<f64>,
}

// ─── Raw entry shape ─────────────────────────────────────────────────────────

/// A value that arrives from the underlying source as either a single token
/// or a list of tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

impl OneOrMany {
  /// Collapse to a single comma-joined string.
  pub fn join(self) -> String {
    match self {
      Self::One(s) => s,
      Self::Many(v) => v.join(","),
    }
  }
}

/// One heterogeneous entry as it appears in the lookup table, before
/// normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGeoEntry {
  /// IPv4 network in `a.b.c.d/len` form (a bare address means `/32`).
  pub network:     String,
  pub country:     Option<String>,
  pub region:      Option<OneOrMany>,
  pub city:        Option<String>,
  /// `[lat, lon]` pair, when the source provides coordinates.
  pub ll:          Option<[f64; 2]>,
  pub accuracy_km: Option<f64>,
}

impl RawGeoEntry {
  /// Normalize into the fixed record shape.
  pub fn normalize(self) -> ApproxLocation {
    ApproxLocation {
      country:     self.country,
      region:      self.region.map(OneOrMany::join),
      city:        self.city,
      lat:         self.ll.map(|p| p[0]),
      lon:         self.ll.map(|p| p[1]),
      accuracy_km: self.accuracy_km,
    }
  }
}

// ─── Lookup trait ────────────────────────────────────────────────────────────

/// Abstraction over the opaque IP → location source.
pub trait GeoLookup: Send + Sync {
  /// Resolve `ip` to an approximate location. Any miss — including empty or
  /// malformed input — is `None`.
  fn lookup(&self, ip: &str) -> Option<ApproxLocation>;
}

// ─── JSON-backed table ───────────────────────────────────────────────────────

/// An IPv4-prefix lookup table loaded from a JSON array of [`RawGeoEntry`].
///
/// Longest-prefix match wins. IPv6 addresses always miss.
pub struct GeoTable {
  entries: Vec<(u32, u32, ApproxLocation)>,
}

impl GeoTable {
  /// Load a table from a JSON file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json(&text)
  }

  /// Parse a table from JSON text. Entries with an unparseable `network`
  /// are skipped rather than failing the whole table.
  pub fn from_json(text: &str) -> Result<Self> {
    let raw: Vec<RawGeoEntry> = serde_json::from_str(text)?;
    let mut entries = Vec::with_capacity(raw.len());
    for entry in raw {
      let Some((net, mask)) = parse_cidr(&entry.network) else {
        continue;
      };
      entries.push((net & mask, mask, entry.normalize()));
    }
    Ok(Self { entries })
  }

  /// A table that misses every lookup.
  pub fn empty() -> Self {
    Self { entries: Vec::new() }
  }
}

impl GeoLookup for GeoTable {
  fn lookup(&self, ip: &str) -> Option<ApproxLocation> {
    let addr: Ipv4Addr = ip.trim().parse().ok()?;
    let bits = u32::from(addr);
    self
      .entries
      .iter()
      .filter(|(net, mask, _)| bits & mask == *net)
      .max_by_key(|(_, mask, _)| *mask)
      .map(|(_, _, loc)| loc.clone())
  }
}

/// Parse `a.b.c.d/len` (or a bare address, treated as `/32`).
fn parse_cidr(s: &str) -> Option<(u32, u32)> {
  let (addr, len) = match s.split_once('/') {
    Some((a, l)) => (a, l.parse::<u8>().ok()?),
    None => (s, 32),
  };
  if len > 32 {
    return None;
  }
  let addr: Ipv4Addr = addr.parse().ok()?;
  let mask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
  Some((u32::from(addr), mask))
}

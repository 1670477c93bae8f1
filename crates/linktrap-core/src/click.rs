//! Click record types — the single persistent entity of the system.
//!
//! A click is captured synchronously from server-observable facts; the
//! precise-enrichment half arrives later (or never) from the browser, joined
//! back to the record through its identifier.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::geo::ApproxLocation;

// ─── Identifier ──────────────────────────────────────────────────────────────

/// Reserved destination value selecting the interactive bait page instead of
/// an immediate redirect. Stored verbatim in `dest_url`.
pub const BAIT_DEST: &str = "bait";

/// Length in bytes of the random click identifier.
pub const CLICK_ID_BYTES: usize = 16;

/// Generate a fresh click identifier: 16 random bytes, lowercase hex.
///
/// The identifier doubles as the correlation secret handed to the browser,
/// so it must be unguessable.
pub fn new_click_id() -> String {
  let mut buf = [0u8; CLICK_ID_BYTES];
  OsRng.fill_bytes(&mut buf);
  hex::encode(buf)
}

// ─── Enrichment ──────────────────────────────────────────────────────────────

/// Precise-enrichment fields reported by the browser after consent.
///
/// Applied as a single atomic update. A later report overwrites an earlier
/// one wholesale — last-write-wins, with no ordering field to arbitrate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrichment {
  pub precise_lat:      Option<f64>,
  pub precise_lon:      Option<f64>,
  /// Reported accuracy radius, metres.
  pub accuracy_m:       Option<f64>,
  /// Browser-side timestamp; defaults to server receipt time when missing.
  pub client_ts:        DateTime<Utc>,
  pub consented:        bool,
  pub platform:         Option<String>,
  pub vendor:           Option<String>,
  pub language:         Option<String>,
  /// Ordered preferred languages, comma-joined for storage.
  pub languages:        Option<String>,
  /// IANA timezone name, e.g. `Europe/Berlin`.
  pub timezone:         Option<String>,
  pub cpu_cores:        Option<i64>,
  pub device_memory_gb: Option<f64>,
  pub screen_w:         Option<i64>,
  pub screen_h:         Option<i64>,
  pub color_depth:      Option<i64>,
  pub do_not_track:     bool,
}

// ─── ClickRecord ─────────────────────────────────────────────────────────────

/// One recorded click.
///
/// Capture-time and approximate-location fields are set exactly once at
/// creation and never change. `enrichment` is `None` until (unless) the
/// browser reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRecord {
  pub id:              String,
  /// Server-assigned timestamp; never changes after creation.
  pub created_at:      DateTime<Utc>,
  pub ip:              Option<String>,
  /// Raw forwarded-address chain, unparsed beyond the first-hop extraction
  /// that produced `ip`.
  pub forwarded_for:   Option<String>,
  pub user_agent:      Option<String>,
  pub accept_language: Option<String>,
  pub referrer:        Option<String>,
  /// Validated destination URL, or [`BAIT_DEST`] in interactive mode.
  pub dest_url:        String,
  pub location:        Option<ApproxLocation>,
  pub enrichment:      Option<Enrichment>,
}

// ─── NewClick ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ClickStore::record_click`].
/// `id` and `created_at` are always assigned by the store; they are not
/// accepted from callers.
#[derive(Debug, Clone)]
pub struct NewClick {
  pub ip:              Option<String>,
  pub forwarded_for:   Option<String>,
  pub user_agent:      Option<String>,
  pub accept_language: Option<String>,
  pub referrer:        Option<String>,
  pub dest_url:        String,
  pub location:        Option<ApproxLocation>,
}

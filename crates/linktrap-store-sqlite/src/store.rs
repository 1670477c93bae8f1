//! [`SqliteStore`] — the SQLite implementation of [`ClickStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use linktrap_core::{
  click::{new_click_id, ClickRecord, Enrichment, NewClick},
  store::ClickStore,
};

use crate::{
  encode::{encode_dt, RawClick},
  schema::{migrate_columns, SCHEMA},
  Error, Result,
};

/// Every persisted column, in the order [`read_raw`] expects.
const COLUMNS: &str = "id, created_at, ip, forwarded_for, user_agent, \
  accept_language, referrer, dest_url, country, region, city, lat, lon, \
  accuracy_km, precise_lat, precise_lon, accuracy_m, client_ts, consented, \
  platform, vendor, language, languages, timezone, cpu_cores, \
  device_memory_gb, screen_w, screen_h, color_depth, do_not_track";

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawClick> {
  Ok(RawClick {
    id:               row.get(0)?,
    created_at:       row.get(1)?,
    ip:               row.get(2)?,
    forwarded_for:    row.get(3)?,
    user_agent:       row.get(4)?,
    accept_language:  row.get(5)?,
    referrer:         row.get(6)?,
    dest_url:         row.get(7)?,
    country:          row.get(8)?,
    region:           row.get(9)?,
    city:             row.get(10)?,
    lat:              row.get(11)?,
    lon:              row.get(12)?,
    accuracy_km:      row.get(13)?,
    precise_lat:      row.get(14)?,
    precise_lon:      row.get(15)?,
    accuracy_m:       row.get(16)?,
    client_ts:        row.get(17)?,
    consented:        row.get(18)?,
    platform:         row.get(19)?,
    vendor:           row.get(20)?,
    language:         row.get(21)?,
    languages:        row.get(22)?,
    timezone:         row.get(23)?,
    cpu_cores:        row.get(24)?,
    device_memory_gb: row.get(25)?,
    screen_w:         row.get(26)?,
    screen_h:         row.get(27)?,
    color_depth:      row.get(28)?,
    do_not_track:     row.get(29)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A click log backed by a single SQLite file in WAL mode.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation,
  /// including the additive-column migration.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        migrate_columns(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ClickStore impl ─────────────────────────────────────────────────────────

impl ClickStore for SqliteStore {
  type Error = Error;

  async fn record_click(&self, input: NewClick) -> Result<ClickRecord> {
    let record = ClickRecord {
      id:              new_click_id(),
      created_at:      Utc::now(),
      ip:              input.ip,
      forwarded_for:   input.forwarded_for,
      user_agent:      input.user_agent,
      accept_language: input.accept_language,
      referrer:        input.referrer,
      dest_url:        input.dest_url,
      location:        input.location,
      enrichment:      None,
    };

    let id             = record.id.clone();
    let created_at_str = encode_dt(record.created_at);
    let ip             = record.ip.clone();
    let forwarded_for  = record.forwarded_for.clone();
    let user_agent     = record.user_agent.clone();
    let accept_lang    = record.accept_language.clone();
    let referrer       = record.referrer.clone();
    let dest_url       = record.dest_url.clone();
    let location       = record.location.clone();

    self
      .conn
      .call(move |conn| {
        let loc = location.as_ref();
        conn.execute(
          "INSERT INTO clicks (
             id, created_at, ip, forwarded_for, user_agent, accept_language,
             referrer, dest_url, country, region, city, lat, lon, accuracy_km
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          rusqlite::params![
            id,
            created_at_str,
            ip,
            forwarded_for,
            user_agent,
            accept_lang,
            referrer,
            dest_url,
            loc.and_then(|l| l.country.clone()),
            loc.and_then(|l| l.region.clone()),
            loc.and_then(|l| l.city.clone()),
            loc.and_then(|l| l.lat),
            loc.and_then(|l| l.lon),
            loc.and_then(|l| l.accuracy_km),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn apply_enrichment(&self, id: &str, enrichment: Enrichment) -> Result<u64> {
    let id = id.to_owned();
    let client_ts_str = encode_dt(enrichment.client_ts);
    let e = enrichment;

    let affected = self
      .conn
      .call(move |conn| {
        // Every column is set unconditionally: a repeat report overwrites
        // the previous one wholesale.
        let n = conn.execute(
          "UPDATE clicks SET
             precise_lat = ?2, precise_lon = ?3, accuracy_m = ?4,
             client_ts = ?5, consented = ?6, platform = ?7, vendor = ?8,
             language = ?9, languages = ?10, timezone = ?11, cpu_cores = ?12,
             device_memory_gb = ?13, screen_w = ?14, screen_h = ?15,
             color_depth = ?16, do_not_track = ?17
           WHERE id = ?1",
          rusqlite::params![
            id,
            e.precise_lat,
            e.precise_lon,
            e.accuracy_m,
            client_ts_str,
            e.consented,
            e.platform,
            e.vendor,
            e.language,
            e.languages,
            e.timezone,
            e.cpu_cores,
            e.device_memory_gb,
            e.screen_w,
            e.screen_h,
            e.color_depth,
            e.do_not_track,
          ],
        )?;
        Ok(n as u64)
      })
      .await?;

    Ok(affected)
  }

  async fn latest(&self) -> Result<Option<ClickRecord>> {
    let raw: Option<RawClick> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {COLUMNS} FROM clicks
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
              ),
              [],
              read_raw,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawClick::into_record).transpose()
  }

  async fn list(&self, limit: u32, offset: u32) -> Result<Vec<ClickRecord>> {
    let raws: Vec<RawClick> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COLUMNS} FROM clicks
           ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit as i64, offset as i64], read_raw)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClick::into_record).collect()
  }
}

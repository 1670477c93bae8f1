//! SQL schema for the linktrap SQLite store.
//!
//! The base (version 1) schema runs at every open via `CREATE TABLE IF NOT
//! EXISTS`. Columns introduced after version 1 are handled by
//! [`migrate_columns`], which adds each missing column independently so the
//! table gains new optional columns without rewriting existing rows.

/// Base schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS clicks (
    id              TEXT PRIMARY KEY,  -- 32-char hex; doubles as the correlation secret
    created_at      TEXT NOT NULL,     -- ISO 8601 UTC; server-assigned
    ip              TEXT,
    forwarded_for   TEXT,              -- raw forwarded-address chain
    user_agent      TEXT,
    accept_language TEXT,
    referrer        TEXT,
    dest_url        TEXT NOT NULL,     -- validated URL or the bait sentinel

    -- approximate (IP-derived) location; populated as a group at creation
    country         TEXT,
    region          TEXT,
    city            TEXT,
    lat             REAL,
    lon             REAL,
    accuracy_km     REAL,

    -- precise browser enrichment; NULL until a report arrives
    precise_lat     REAL,
    precise_lon     REAL,
    accuracy_m      REAL,
    client_ts       TEXT,              -- non-NULL marks an applied report
    consented       INTEGER
);

CREATE INDEX IF NOT EXISTS clicks_created_idx ON clicks(created_at);

PRAGMA user_version = 1;
";

/// Columns introduced after version 1 — the device fingerprint bundle.
/// All nullable, so existing rows need no rewrite and no defaults.
pub const ADDED_COLUMNS: &[(&str, &str)] = &[
  ("platform", "TEXT"),
  ("vendor", "TEXT"),
  ("language", "TEXT"),
  ("languages", "TEXT"), // comma-joined preference list
  ("timezone", "TEXT"),
  ("cpu_cores", "INTEGER"),
  ("device_memory_gb", "REAL"),
  ("screen_w", "INTEGER"),
  ("screen_h", "INTEGER"),
  ("color_depth", "INTEGER"),
  ("do_not_track", "INTEGER"),
];

/// Add any [`ADDED_COLUMNS`] missing from the live table.
///
/// Idempotent: running against a current schema is a no-op. Each addition is
/// attempted independently; a failure is logged and does not abort startup.
pub fn migrate_columns(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare("PRAGMA table_info(clicks)")?;
  let existing: Vec<String> = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<_>>()?;

  for (name, ty) in ADDED_COLUMNS {
    if existing.iter().any(|c| c == name) {
      continue;
    }
    let ddl = format!("ALTER TABLE clicks ADD COLUMN {name} {ty}");
    if let Err(e) = conn.execute(&ddl, []) {
      tracing::warn!(column = name, error = %e, "schema column add failed");
    }
  }

  Ok(())
}

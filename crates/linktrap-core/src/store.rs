//! The `ClickStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `linktrap-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend,
//! which also lets tests substitute an in-memory store.

use std::future::Future;

use crate::click::{ClickRecord, Enrichment, NewClick};

/// Abstraction over the durable click log.
///
/// Every write targets a distinct identifier except the enrichment update,
/// which is a point update setting every column unconditionally from the
/// incoming payload — no read-modify-write, so no cross-request races.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ClickStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create and persist a new click record. The identifier and `created_at`
  /// are assigned by the store; an identifier collision on insert is an
  /// internal error for that request.
  fn record_click(
    &self,
    input: NewClick,
  ) -> impl Future<Output = Result<ClickRecord, Self::Error>> + Send + '_;

  /// Apply an enrichment update to the record with this identifier.
  ///
  /// Returns the number of rows affected — zero when no record carries
  /// `id`, which callers treat as silent success. A repeat update
  /// overwrites the previous one (last-write-wins).
  fn apply_enrichment<'a>(
    &'a self,
    id: &'a str,
    enrichment: Enrichment,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// The most recently created record, if any.
  fn latest(
    &self,
  ) -> impl Future<Output = Result<Option<ClickRecord>, Self::Error>> + Send + '_;

  /// Records ordered by creation time descending. `limit` and `offset` are
  /// assumed to be already clamped by the caller.
  fn list(
    &self,
    limit: u32,
    offset: u32,
  ) -> impl Future<Output = Result<Vec<ClickRecord>, Self::Error>> + Send + '_;
}

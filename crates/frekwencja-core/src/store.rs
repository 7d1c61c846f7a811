//! The `AttendanceStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `frekwencja-store-sqlite`). The API layer depends on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  aggregate::EntryFilter,
  entry::AttendanceEntry,
  ledger::EntryUpdate,
  plan::Plan,
  state::AttendanceState,
};

// ─── Query types ─────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

/// Parameters for [`AttendanceStore::list_entries`].
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
  pub filter: EntryFilter,
  /// Return only entries whose id sorts after this one.
  pub cursor: Option<String>,
  pub limit:  Option<usize>,
}

impl EntryQuery {
  /// The effective page size: default 50, clamped to `1..=200`.
  pub fn page_limit(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
  }

  /// Apply the query to entries already in memory. Entries are returned
  /// sorted by id.
  pub fn page<'a>(&self, entries: impl IntoIterator<Item = &'a AttendanceEntry>) -> EntryPage {
    let mut matching: Vec<&AttendanceEntry> = entries
      .into_iter()
      .filter(|e| self.filter.matches(e))
      .filter(|e| self.cursor.as_deref().is_none_or(|c| e.id.as_str() > c))
      .collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));

    let limit = self.page_limit();
    let next_cursor = (matching.len() > limit).then(|| matching[limit - 1].id.clone());
    EntryPage {
      entries: matching.into_iter().take(limit).cloned().collect(),
      next_cursor,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPage {
  pub entries:     Vec<AttendanceEntry>,
  pub next_cursor: Option<String>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend errors must expose the domain error they wrap, if any, so that
/// callers can tell a version conflict from a broken database.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn as_core(&self) -> Option<&crate::Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a per-user attendance store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: StoreError;

  // ── Whole state ───────────────────────────────────────────────────────

  /// The user's state; a default state when nothing is stored yet.
  fn load_state<'a>(
    &'a self,
    user: &'a str,
  ) -> impl Future<Output = Result<AttendanceState, Self::Error>> + Send + 'a;

  /// Replace the user's state (last write wins). Returns the stored state
  /// with its version bumped and `updated_at` set by the store.
  fn save_state<'a>(
    &'a self,
    user: &'a str,
    state: AttendanceState,
  ) -> impl Future<Output = Result<AttendanceState, Self::Error>> + Send + 'a;

  // ── Entries ───────────────────────────────────────────────────────────

  fn list_entries<'a>(
    &'a self,
    user: &'a str,
    query: &'a EntryQuery,
  ) -> impl Future<Output = Result<EntryPage, Self::Error>> + Send + 'a;

  /// Apply presence updates atomically. A stale expected version rejects the
  /// whole batch with [`crate::Error::VersionConflict`]. Unknown ids are
  /// skipped. Returns the number of entries updated.
  fn update_entries<'a>(
    &'a self,
    user: &'a str,
    updates: &'a [EntryUpdate],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Mark every entry of a day present or absent; returns how many changed.
  fn set_day_present<'a>(
    &'a self,
    user: &'a str,
    date: NaiveDate,
    present: bool,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Replace a whole day. Entries keeping an existing id continue from its
  /// version, and the state counts as written. Returns how many entries were
  /// removed.
  fn replace_day<'a>(
    &'a self,
    user: &'a str,
    date: NaiveDate,
    entries: Vec<AttendanceEntry>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Insert entries whose ids do not exist yet; returns how many were added.
  fn add_entries<'a>(
    &'a self,
    user: &'a str,
    entries: Vec<AttendanceEntry>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  // ── Plans ─────────────────────────────────────────────────────────────

  fn list_plans<'a>(
    &'a self,
    user: &'a str,
  ) -> impl Future<Output = Result<Vec<Plan>, Self::Error>> + Send + 'a;
}

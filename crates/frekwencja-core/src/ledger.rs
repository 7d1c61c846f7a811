//! The attendance ledger: every recorded lesson, bucketed by date.
//!
//! All mutations bump the affected entries' versions so that the remote store
//! can reject stale writes (see [`Ledger::apply_updates`]).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  calendar::school_week,
  entry::{AttendanceEntry, date_of_id, sort_day},
  plan::Plan,
};

/// One requested presence change, optionally guarded by the version the
/// caller last saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUpdate {
  pub id:               String,
  pub present:          bool,
  pub expected_version: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger(BTreeMap<NaiveDate, Vec<AttendanceEntry>>);

impl Ledger {
  pub fn new() -> Self { Self::default() }

  /// Group loose entries into date buckets, each in lesson order.
  pub fn from_entries(entries: impl IntoIterator<Item = AttendanceEntry>) -> Self {
    let mut by_date: BTreeMap<NaiveDate, Vec<AttendanceEntry>> = BTreeMap::new();
    for entry in entries {
      by_date.entry(entry.date).or_default().push(entry);
    }
    for bucket in by_date.values_mut() {
      sort_day(bucket);
    }
    Self(by_date)
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  pub fn day(&self, date: NaiveDate) -> &[AttendanceEntry] {
    self.0.get(&date).map(Vec::as_slice).unwrap_or_default()
  }

  /// Whether the user has already logged anything for `date`.
  pub fn has_entries(&self, date: NaiveDate) -> bool { !self.day(date).is_empty() }

  /// Every entry, in date order.
  pub fn entries(&self) -> impl Iterator<Item = &AttendanceEntry> {
    self.0.values().flatten()
  }

  pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ { self.0.keys().copied() }

  pub fn find(&self, id: &str) -> Option<&AttendanceEntry> {
    let date = date_of_id(id).ok()?;
    self.day(date).iter().find(|e| e.id == id)
  }

  pub fn len(&self) -> usize { self.0.values().map(Vec::len).sum() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn find_mut(&mut self, date: NaiveDate, id: &str) -> Option<&mut AttendanceEntry> {
    self.0.get_mut(&date)?.iter_mut().find(|e| e.id == id)
  }

  // ── Plan fill ───────────────────────────────────────────────────────────

  /// Add one present entry per plan item for `date`'s weekday, skipping any
  /// slot whose id already exists. Returns how many rows were added; calling
  /// it again without edits adds nothing.
  pub fn fill_day_from_plan(&mut self, plan: &Plan, date: NaiveDate) -> usize {
    let fresh = plan.materialize_day(date, true);
    if fresh.is_empty() {
      return 0;
    }

    let bucket = self.0.entry(date).or_default();
    let mut added = 0;
    for entry in fresh {
      if bucket.iter().any(|e| e.id == entry.id) {
        continue;
      }
      bucket.push(entry);
      added += 1;
    }
    sort_day(bucket);
    added
  }

  /// [`Self::fill_day_from_plan`] for Monday through Friday of the week
  /// starting at `monday`.
  pub fn fill_week_from_plan(&mut self, plan: &Plan, monday: NaiveDate) -> usize {
    school_week(monday)
      .map(|date| self.fill_day_from_plan(plan, date))
      .sum()
  }

  /// Replace a whole day, returning the entries that were there before.
  ///
  /// An incoming entry whose id already existed continues counting from the
  /// stored version, so tags handed out before the overwrite go stale.
  pub fn replace_day(
    &mut self,
    date: NaiveDate,
    mut entries: Vec<AttendanceEntry>,
  ) -> Vec<AttendanceEntry> {
    let previous = self.0.remove(&date).unwrap_or_default();
    for entry in &mut entries {
      if let Some(old) = previous.iter().find(|e| e.id == entry.id) {
        entry.version = entry.version.max(old.version.saturating_add(1));
      }
    }
    sort_day(&mut entries);
    if !entries.is_empty() {
      self.0.insert(date, entries);
    }
    previous
  }

  // ── Entry edits ─────────────────────────────────────────────────────────

  /// Insert or replace by id. A replaced entry keeps counting versions from
  /// the stored one.
  pub fn upsert_entry(&mut self, mut entry: AttendanceEntry) {
    let bucket = self.0.entry(entry.date).or_default();
    match bucket.iter_mut().find(|e| e.id == entry.id) {
      Some(existing) => {
        entry.version = existing.version.saturating_add(1);
        *existing = entry;
      }
      None => bucket.push(entry),
    }
    sort_day(bucket);
  }

  /// Flip an entry's presence; returns the new value.
  pub fn toggle_present(&mut self, date: NaiveDate, id: &str) -> Result<bool> {
    let entry = self
      .find_mut(date, id)
      .ok_or_else(|| Error::EntryNotFound(id.to_owned()))?;
    let next = !entry.present;
    entry.set_present(next);
    Ok(next)
  }

  /// Remove a single row. Returns whether anything was removed.
  pub fn delete_entry(&mut self, date: NaiveDate, id: &str) -> bool {
    let Some(bucket) = self.0.get_mut(&date) else {
      return false;
    };
    let before = bucket.len();
    bucket.retain(|e| e.id != id);
    let removed = bucket.len() != before;
    if bucket.is_empty() {
      self.0.remove(&date);
    }
    removed
  }

  /// Mark every lesson of a day present or absent. Returns how many entries
  /// actually changed.
  pub fn set_day_present(&mut self, date: NaiveDate, present: bool) -> usize {
    self
      .0
      .get_mut(&date)
      .map(|bucket| {
        bucket
          .iter_mut()
          .map(|e| e.set_present(present))
          .filter(|changed| *changed)
          .count()
      })
      .unwrap_or(0)
  }

  /// Set one entry's presence, guarded by the version the caller last saw.
  /// Returns the entry as stored afterwards.
  pub fn update_entry(
    &mut self,
    id: &str,
    present: bool,
    expected_version: Option<u32>,
  ) -> Result<&AttendanceEntry> {
    let date = date_of_id(id)?;
    let entry = self
      .find_mut(date, id)
      .ok_or_else(|| Error::EntryNotFound(id.to_owned()))?;
    if let Some(expected) = expected_version
      && expected != entry.version
    {
      return Err(Error::VersionConflict {
        id: id.to_owned(),
        expected,
        actual: entry.version,
      });
    }
    entry.present = present;
    entry.touch();
    Ok(entry)
  }

  /// Apply a batch of presence updates atomically.
  ///
  /// Every expected version is checked before anything changes; a single
  /// mismatch rejects the whole batch with [`Error::VersionConflict`]. Unknown
  /// ids are skipped. Returns the number of entries updated.
  pub fn apply_updates(&mut self, updates: &[EntryUpdate]) -> Result<usize> {
    let mut targets = Vec::with_capacity(updates.len());
    for update in updates {
      let Ok(date) = date_of_id(&update.id) else {
        continue;
      };
      let Some(current) = self.day(date).iter().find(|e| e.id == update.id) else {
        continue;
      };
      if let Some(expected) = update.expected_version
        && expected != current.version
      {
        return Err(Error::VersionConflict {
          id: update.id.clone(),
          expected,
          actual: current.version,
        });
      }
      targets.push((date, update));
    }

    for (date, update) in &targets {
      if let Some(entry) = self.find_mut(*date, &update.id) {
        entry.present = update.present;
        entry.touch();
      }
    }
    Ok(targets.len())
  }
}

//! Attendance ratios and the "how many more / how many fewer" arithmetic.
//!
//! A [`Tally`] is the `(present, total)` pair everything else is derived from.
//! Nothing here is cached: summaries are recomputed from the ledger on every
//! call.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{entry::AttendanceEntry, subject::normalize};

// ─── Tally ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
  pub present: u32,
  pub total:   u32,
}

impl Tally {
  pub fn new(present: u32, total: u32) -> Self { Self { present, total } }

  pub fn record(&mut self, present: bool) {
    self.total += 1;
    if present {
      self.present += 1;
    }
  }

  /// Count `n` hypothetical misses.
  pub fn miss(self, n: u32) -> Self {
    Self { present: self.present, total: self.total + n }
  }

  pub fn plus(self, other: Self) -> Self {
    Self {
      present: self.present + other.present,
      total:   self.total + other.total,
    }
  }

  /// Attendance in percent; 0 when nothing has been recorded.
  pub fn percent(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      f64::from(self.present) / f64::from(self.total) * 100.0
    }
  }

  /// Signed lessons of slack relative to 50%: `2*present - total`.
  pub fn buffer(&self) -> i64 { 2 * i64::from(self.present) - i64::from(self.total) }

  /// Consecutive presences needed to get back to 50%.
  pub fn need_to_reach_50(&self) -> u32 {
    self.total.saturating_sub(2 * self.present)
  }

  /// Absences that can still be taken while staying at or above 50%.
  pub fn can_skip_and_keep_50(&self) -> u32 {
    (2 * self.present).saturating_sub(self.total)
  }

  /// Smallest `n` such that attending the next `n` lessons brings the ratio
  /// to at least `target` percent. `None` when no number of presences can
  /// (a 100% target with a miss already on record).
  pub fn need_to_reach(&self, target: u8) -> Option<u32> {
    if self.total == 0 {
      return Some(0);
    }
    let target = i64::from(target.min(100));
    let deficit = target * i64::from(self.total) - 100 * i64::from(self.present);
    if deficit <= 0 {
      return Some(0);
    }
    if target == 100 {
      return None;
    }
    let den = 100 - target;
    Some(clamp_u32((deficit + den - 1) / den))
  }

  /// Largest `n` such that missing the next `n` lessons keeps the ratio at or
  /// above `target` percent. `None` means unbounded (a 0% target).
  pub fn margin_above(&self, target: u8) -> Option<u32> {
    if self.total == 0 {
      return Some(0);
    }
    let target = i64::from(target.min(100));
    if target == 0 {
      return None;
    }
    let slack = 100 * i64::from(self.present) - target * i64::from(self.total);
    Some(if slack <= 0 { 0 } else { clamp_u32(slack / target) })
  }
}

fn clamp_u32(v: i64) -> u32 { u32::try_from(v.max(0)).unwrap_or(u32::MAX) }

// ─── Filtering ───────────────────────────────────────────────────────────────

/// Restricts an aggregation to a date range and/or a subject. Bounds are
/// inclusive; the subject is compared on normalized keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
  pub from:        Option<NaiveDate>,
  pub to:          Option<NaiveDate>,
  pub subject_key: Option<String>,
}

impl EntryFilter {
  pub fn matches(&self, entry: &AttendanceEntry) -> bool {
    self.from.is_none_or(|from| entry.date >= from)
      && self.to.is_none_or(|to| entry.date <= to)
      && self
        .subject_key
        .as_deref()
        .is_none_or(|key| normalize(key) == entry.subject())
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Dashboard numbers for one slice of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
  pub total:                u32,
  pub present:              u32,
  pub percent:              f64,
  pub need_to_reach_50:     u32,
  pub can_skip_and_keep_50: u32,
}

impl From<Tally> for AttendanceSummary {
  fn from(t: Tally) -> Self {
    Self {
      total:                t.total,
      present:              t.present,
      percent:              t.percent(),
      need_to_reach_50:     t.need_to_reach_50(),
      can_skip_and_keep_50: t.can_skip_and_keep_50(),
    }
  }
}

pub fn tally<'a>(
  entries: impl IntoIterator<Item = &'a AttendanceEntry>,
  filter: &EntryFilter,
) -> Tally {
  let mut t = Tally::default();
  for entry in entries.into_iter().filter(|e| filter.matches(e)) {
    t.record(entry.present);
  }
  t
}

pub fn aggregate<'a>(
  entries: impl IntoIterator<Item = &'a AttendanceEntry>,
  filter: &EntryFilter,
) -> AttendanceSummary {
  tally(entries, filter).into()
}

// ─── Breakdown ───────────────────────────────────────────────────────────────

/// Global and per-subject tallies, keyed by normalized subject key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakdown {
  pub global:      Tally,
  pub per_subject: BTreeMap<String, Tally>,
}

impl Breakdown {
  pub fn of<'a>(entries: impl IntoIterator<Item = &'a AttendanceEntry>) -> Self {
    let mut out = Self::default();
    for entry in entries {
      out.record(entry.subject(), entry.present);
    }
    out
  }

  pub fn record(&mut self, key: String, present: bool) {
    self.global.record(present);
    self.per_subject.entry(key).or_default().record(present);
  }

  pub fn subject(&self, key: &str) -> Tally {
    self.per_subject.get(key).copied().unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{calendar::parse_date, entry::AttendanceEntry, plan::PlanItem};

  fn entry(date: &str, key: &str, position: usize, present: bool) -> AttendanceEntry {
    let item = PlanItem {
      slot_hint:     None,
      subject_key:   key.into(),
      subject_label: key.into(),
    };
    AttendanceEntry::from_plan_item(parse_date(date).unwrap(), &item, position, present)
  }

  #[test]
  fn empty_ledger_is_all_zeroes() {
    let s = aggregate(&Vec::<AttendanceEntry>::new(), &EntryFilter::default());
    assert_eq!(s.total, 0);
    assert_eq!(s.percent, 0.0);
    assert_eq!(s.need_to_reach_50, 0);
    assert_eq!(s.can_skip_and_keep_50, 0);
    assert_eq!(Tally::default().need_to_reach(75), Some(0));
    assert_eq!(Tally::default().margin_above(75), Some(0));
  }

  #[test]
  fn closed_forms_at_fifty_percent() {
    for present in 0..30u32 {
      for total in present..40u32 {
        let t = Tally::new(present, total);
        let need = t.need_to_reach_50();
        assert_eq!(i64::from(need), (i64::from(total) - 2 * i64::from(present)).max(0));
        assert_eq!(t.need_to_reach(50), Some(need));

        let after = Tally::new(present + need, total + need);
        assert!(after.buffer() >= 0);
        if need > 0 {
          assert!(Tally::new(present + need - 1, total + need - 1).buffer() < 0);
        }

        let skip = t.can_skip_and_keep_50();
        assert_eq!(t.margin_above(50), Some(skip));
        if total > 0 {
          assert!(t.miss(skip).buffer() >= 0 || skip == 0);
          if t.buffer() >= 0 {
            assert!(t.miss(skip + 1).buffer() < 0);
          }
        }
      }
    }
  }

  #[test]
  fn percent_stays_in_range() {
    for present in 0..20u32 {
      for total in present..20u32 {
        let p = Tally::new(present, total).percent();
        assert!((0.0..=100.0).contains(&p));
        assert_eq!(p == 0.0, present == 0 || total == 0);
      }
    }
  }

  #[test]
  fn general_targets() {
    // 6 of 10 at 75%: (6+n)/(10+n) >= 0.75 → n >= 6.
    assert_eq!(Tally::new(6, 10).need_to_reach(75), Some(6));
    // 9 of 10 at 75%: 9/(10+n) >= 0.75 → n <= 2.
    assert_eq!(Tally::new(9, 10).margin_above(75), Some(2));
    assert_eq!(Tally::new(9, 10).need_to_reach(100), None);
    assert_eq!(Tally::new(10, 10).need_to_reach(100), Some(0));
    assert_eq!(Tally::new(3, 10).margin_above(0), None);
  }

  #[test]
  fn filters_by_range_and_normalized_subject() {
    let entries = vec![
      entry("2024-09-02", "Matematyka 1/2", 1, true),
      entry("2024-09-03", "r_matematyka", 1, false),
      entry("2024-09-04", "fizyka", 1, true),
      entry("2024-09-05", "matematyka", 2, true),
    ];

    let math = EntryFilter {
      subject_key: Some("MATEMATYKA".into()),
      ..EntryFilter::default()
    };
    let s = aggregate(&entries, &math);
    assert_eq!((s.present, s.total), (2, 3));

    let range = EntryFilter {
      from: Some(parse_date("2024-09-03").unwrap()),
      to: Some(parse_date("2024-09-04").unwrap()),
      subject_key: None,
    };
    let s = aggregate(&entries, &range);
    assert_eq!((s.present, s.total), (1, 2));
    assert_eq!(s.percent, 50.0);
  }

  #[test]
  fn keyless_entries_count_under_their_label() {
    let mut keyless = entry("2024-09-02", "", 1, false);
    keyless.subject_label = "Fizyka 2/2".into();
    let entries = vec![keyless, entry("2024-09-03", "fizyka", 1, true)];

    let physics = EntryFilter {
      subject_key: Some("Fizyka".into()),
      ..EntryFilter::default()
    };
    let s = aggregate(&entries, &physics);
    assert_eq!((s.present, s.total), (1, 2));
    assert_eq!(Breakdown::of(&entries).subject("fizyka"), Tally::new(s.present, s.total));
  }

  #[test]
  fn breakdown_groups_by_normalized_key() {
    let entries = vec![
      entry("2024-09-02", "Matematyka 1/2", 1, true),
      entry("2024-09-03", "r_matematyka", 1, false),
      entry("2024-09-04", "fizyka", 1, true),
    ];
    let b = Breakdown::of(&entries);
    assert_eq!(b.global, Tally::new(2, 3));
    assert_eq!(b.subject("matematyka"), Tally::new(1, 2));
    assert_eq!(b.subject("chemia"), Tally::default());
  }
}

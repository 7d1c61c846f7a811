//! Weekly plans: templates mapping weekdays to ordered lesson slots.
//!
//! A plan has no dates. It is turned into ledger rows by the fill operations
//! in [`crate::ledger`] and read by the planner to project future lessons.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{calendar::DayName, entry::AttendanceEntry};

/// One lesson slot in a plan day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
  /// Optional position or time hint, e.g. `"3"` or `"08:00"`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub slot_hint:     Option<String>,
  pub subject_key:   String,
  #[serde(default)]
  pub subject_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDay {
  #[serde(default)]
  pub items: Vec<PlanItem>,
}

/// Where a plan was imported from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlanSource {
  /// Generated from the school timetable for a class (and optional group).
  School {
    class_id:   String,
    class_name: String,
    #[serde(default)]
    group:      Option<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
  pub id:         String,
  pub name:       String,
  #[serde(default)]
  pub days:       BTreeMap<DayName, PlanDay>,
  /// Milliseconds since the epoch on the wire.
  #[serde(
    default = "unix_epoch",
    with = "chrono::serde::ts_milliseconds"
  )]
  pub created_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source:     Option<PlanSource>,
}

fn unix_epoch() -> DateTime<Utc> { DateTime::<Utc>::UNIX_EPOCH }

impl Plan {
  /// A new, empty plan with a fresh id.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      id:         Uuid::new_v4().to_string(),
      name:       name.into(),
      days:       BTreeMap::new(),
      created_at: Utc::now(),
      source:     None,
    }
  }

  /// The ordered items for `day`; empty when the plan does not define it.
  pub fn items_for_day(&self, day: DayName) -> &[PlanItem] {
    self.days.get(&day).map(|d| d.items.as_slice()).unwrap_or_default()
  }

  pub fn lessons_on(&self, date: NaiveDate) -> &[PlanItem] {
    self.items_for_day(DayName::of(date))
  }

  /// Fresh ledger rows for `date`, one per plan item.
  pub fn materialize_day(&self, date: NaiveDate, present: bool) -> Vec<AttendanceEntry> {
    self
      .lessons_on(date)
      .iter()
      .enumerate()
      .map(|(idx, item)| AttendanceEntry::from_plan_item(date, item, idx + 1, present))
      .collect()
  }

  /// Every `(key, label)` pair referenced by the plan, in day order.
  pub fn subjects(&self) -> impl Iterator<Item = (&str, &str)> {
    self.days.values().flat_map(|d| {
      d.items
        .iter()
        .map(|it| (it.subject_key.as_str(), it.subject_label.as_str()))
    })
  }
}

// ─── Naming ──────────────────────────────────────────────────────────────────

/// Display names for a set of plans. Plans sharing a name are disambiguated
/// as `"Name"`, `"Name (1)"`, `"Name (2)"`… in order of creation, then id.
pub fn display_names(plans: &[Plan]) -> HashMap<String, String> {
  let mut by_name: BTreeMap<&str, Vec<&Plan>> = BTreeMap::new();
  for plan in plans {
    by_name.entry(plan.name.as_str()).or_default().push(plan);
  }

  let mut names = HashMap::with_capacity(plans.len());
  for (base, mut group) in by_name {
    group.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    for (idx, plan) in group.into_iter().enumerate() {
      let name = if idx == 0 { base.to_owned() } else { format!("{base} ({idx})") };
      names.insert(plan.id.clone(), name);
    }
  }
  names
}

/// `desired`, or the first `"desired (n)"` not already used by `plans`.
pub fn ensure_unique_name(plans: &[Plan], desired: &str) -> String {
  let taken = |name: &str| plans.iter().any(|p| p.name == name);
  if !taken(desired) {
    return desired.to_owned();
  }
  (1..)
    .map(|n| format!("{desired} ({n})"))
    .find(|candidate| !taken(candidate))
    .unwrap_or_else(|| desired.to_owned())
}

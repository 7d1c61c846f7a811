//! Attendance entries: one row per lesson on a given date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, calendar::DayName, plan::PlanItem, subject::key_or_label};

/// A single lesson on a single date, present or not.
///
/// `id` is `"<date>#<slot>"` and `slot` is `"<dayName>#<slotHint|position>"`,
/// so materialising the same plan item for the same date always yields the
/// same id. `version` starts at 1 and is bumped by every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
  pub id:            String,
  pub date:          NaiveDate,
  pub day_name:      DayName,
  pub slot:          String,
  pub subject_key:   String,
  pub subject_label: String,
  pub present:       bool,
  #[serde(default = "initial_version", alias = "_v")]
  pub version:       u32,
}

pub(crate) fn initial_version() -> u32 { 1 }

impl AttendanceEntry {
  /// Build the entry a plan item produces on `date`. `position` is 1-based
  /// and only used when the item carries no slot hint.
  pub fn from_plan_item(
    date: NaiveDate,
    item: &PlanItem,
    position: usize,
    present: bool,
  ) -> Self {
    let day_name = DayName::of(date);
    let slot = slot_for(day_name, item.slot_hint.as_deref(), position);
    Self {
      id: id_for(date, &slot),
      date,
      day_name,
      slot,
      subject_key: item.subject_key.clone(),
      subject_label: if item.subject_label.is_empty() {
        item.subject_key.clone()
      } else {
        item.subject_label.clone()
      },
      present,
      version: initial_version(),
    }
  }

  /// Numeric lesson position taken from the slot, used for ordering within a
  /// day. Slots like `"Wtorek#08:00"` order by their leading digits; slots
  /// with no digits sort first.
  pub fn position(&self) -> u32 {
    let tail = self.slot.split('#').nth(1).unwrap_or_default();
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
  }

  /// Normalized subject this lesson counts towards.
  pub fn subject(&self) -> String { key_or_label(&self.subject_key, &self.subject_label) }

  /// The quoted ETag-style version tag, e.g. `"v3"`.
  pub fn version_tag(&self) -> String { format!("\"v{}\"", self.version) }

  /// Record a mutation.
  pub fn touch(&mut self) { self.version = self.version.saturating_add(1); }

  /// Set presence, bumping the version only when the value changes.
  pub fn set_present(&mut self, present: bool) -> bool {
    if self.present == present {
      return false;
    }
    self.present = present;
    self.touch();
    true
  }
}

pub fn slot_for(day: DayName, hint: Option<&str>, position: usize) -> String {
  match hint.map(str::trim).filter(|h| !h.is_empty()) {
    Some(hint) => format!("{day}#{hint}"),
    None => format!("{day}#{position}"),
  }
}

pub fn id_for(date: NaiveDate, slot: &str) -> String { format!("{date}#{slot}") }

/// The date bucket an entry id belongs to.
pub fn date_of_id(id: &str) -> Result<NaiveDate> {
  let head = id.split('#').next().unwrap_or_default();
  crate::calendar::parse_date(head)
}

/// Parse an `If-Match` style version tag. Accepts `"v3"`, `v3` and `3`.
pub fn parse_version_tag(tag: &str) -> Result<u32> {
  let bare = tag.trim().trim_matches('"');
  let digits = bare.strip_prefix('v').unwrap_or(bare);
  digits
    .parse()
    .map_err(|_| Error::InvalidVersionTag(tag.to_owned()))
}

/// Keep a day's entries in lesson order, then by label.
pub fn sort_day(entries: &mut [AttendanceEntry]) {
  entries.sort_by(|a, b| {
    a.position()
      .cmp(&b.position())
      .then_with(|| a.subject_label.cmp(&b.subject_label))
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::calendar::parse_date;

  fn item(key: &str, hint: Option<&str>) -> PlanItem {
    PlanItem {
      slot_hint:     hint.map(str::to_owned),
      subject_key:   key.into(),
      subject_label: String::new(),
    }
  }

  #[test]
  fn ids_are_derived_from_date_and_slot() {
    let date = parse_date("2024-09-03").unwrap();
    let e = AttendanceEntry::from_plan_item(date, &item("fizyka", None), 2, true);
    assert_eq!(e.slot, "Wtorek#2");
    assert_eq!(e.id, "2024-09-03#Wtorek#2");
    assert_eq!(e.subject_label, "fizyka");
    assert_eq!(e.version, 1);

    let hinted =
      AttendanceEntry::from_plan_item(date, &item("fizyka", Some("08:00")), 2, true);
    assert_eq!(hinted.id, "2024-09-03#Wtorek#08:00");
    assert_eq!(hinted.position(), 8);
  }

  #[test]
  fn version_tags_roundtrip() {
    let date = parse_date("2024-09-03").unwrap();
    let mut e = AttendanceEntry::from_plan_item(date, &item("wf", None), 1, false);
    assert!(e.set_present(true));
    assert!(!e.set_present(true));
    assert_eq!(e.version_tag(), "\"v2\"");
    assert_eq!(parse_version_tag(&e.version_tag()).unwrap(), 2);
    assert_eq!(parse_version_tag("7").unwrap(), 7);
    assert!(parse_version_tag("\"abc\"").is_err());
  }

  #[test]
  fn legacy_version_field_is_accepted() {
    let json = r#"{
      "id": "2024-09-03#Wtorek#1", "date": "2024-09-03", "dayName": "Wtorek",
      "slot": "Wtorek#1", "subjectKey": "wf", "subjectLabel": "WF",
      "present": true, "_v": 4
    }"#;
    let e: AttendanceEntry = serde_json::from_str(json).unwrap();
    assert_eq!(e.version, 4);
    assert_eq!(date_of_id(&e.id).unwrap(), e.date);
  }
}

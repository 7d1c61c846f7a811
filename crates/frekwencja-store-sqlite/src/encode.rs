//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, and the subject
//! and plan lists are compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use frekwencja_core::{
  calendar::{DayName, parse_date},
  entry::AttendanceEntry,
  plan::Plan,
  subject::Subject,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  parse_date(s).map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_subjects(subjects: &[Subject]) -> Result<String> {
  Ok(serde_json::to_string(subjects)?)
}

pub fn encode_plans(plans: &[Plan]) -> Result<String> { Ok(serde_json::to_string(plans)?) }

pub fn decode_plans(s: &str) -> Result<Vec<Plan>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of one `attendance_entries` row, ready for binding.
pub struct EntryParams {
  pub entry_id:      String,
  pub date:          String,
  pub day_name:      String,
  pub slot:          String,
  pub subject_key:   String,
  pub subject_label: String,
  pub present:       bool,
  pub version:       u32,
}

impl From<&AttendanceEntry> for EntryParams {
  fn from(e: &AttendanceEntry) -> Self {
    Self {
      entry_id:      e.id.clone(),
      date:          encode_date(e.date),
      day_name:      e.day_name.to_string(),
      slot:          e.slot.clone(),
      subject_key:   e.subject_key.clone(),
      subject_label: e.subject_label.clone(),
      present:       e.present,
      version:       e.version,
    }
  }
}

/// The SELECT list matching [`RawEntry::from_row`].
pub const ENTRY_COLUMNS: &str =
  "entry_id, date, day_name, slot, subject_key, subject_label, present, version";

/// Raw values read directly from an `attendance_entries` row.
pub struct RawEntry {
  pub entry_id:      String,
  pub date:          String,
  pub day_name:      String,
  pub slot:          String,
  pub subject_key:   String,
  pub subject_label: String,
  pub present:       bool,
  pub version:       u32,
}

impl RawEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:      row.get(0)?,
      date:          row.get(1)?,
      day_name:      row.get(2)?,
      slot:          row.get(3)?,
      subject_key:   row.get(4)?,
      subject_label: row.get(5)?,
      present:       row.get(6)?,
      version:       row.get(7)?,
    })
  }

  pub fn into_entry(self) -> Result<AttendanceEntry> {
    Ok(AttendanceEntry {
      date:          decode_date(&self.date)?,
      day_name:      self.day_name.parse::<DayName>()?,
      id:            self.entry_id,
      slot:          self.slot,
      subject_key:   self.subject_key,
      subject_label: self.subject_label,
      present:       self.present,
      version:       self.version,
    })
  }
}

/// Raw strings read from an `attendance_states` row.
pub struct RawState {
  pub subjects_json: String,
  pub plans_json:    String,
  pub version:       u32,
  pub updated_at:    String,
}

pub struct DecodedState {
  pub subjects:   Vec<Subject>,
  pub plans:      Vec<Plan>,
  pub version:    u32,
  pub updated_at: DateTime<Utc>,
}

impl RawState {
  pub fn decode(self) -> Result<DecodedState> {
    Ok(DecodedState {
      subjects:   serde_json::from_str(&self.subjects_json)?,
      plans:      decode_plans(&self.plans_json)?,
      version:    self.version,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

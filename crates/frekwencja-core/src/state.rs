//! The per-user attendance state: subjects, plans and the ledger.
//!
//! This is the unit that is persisted and synchronised as a whole. Entry-level
//! operations live on [`Ledger`]; this module adds the subject and plan
//! bookkeeping around it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  ledger::Ledger,
  plan::Plan,
  subject::{Subject, normalize},
};

pub const DEFAULT_SUBJECTS: [(&str, &str); 3] = [
  ("matematyka", "Matematyka"),
  ("j.polski", "Język polski"),
  ("informatyka", "Informatyka"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceState {
  #[serde(default)]
  pub subjects:   Vec<Subject>,
  #[serde(default)]
  pub plans:      Vec<Plan>,
  #[serde(default)]
  pub by_date:    Ledger,
  /// Bumped by the store on every successful save.
  #[serde(default = "crate::entry::initial_version")]
  pub version:    u32,
  #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
  pub updated_at: DateTime<Utc>,
}

impl Default for AttendanceState {
  fn default() -> Self {
    Self {
      subjects:   DEFAULT_SUBJECTS
        .iter()
        .map(|(key, label)| Subject::new(*key, *label))
        .collect(),
      plans:      Vec::new(),
      by_date:    Ledger::new(),
      version:    1,
      updated_at: Utc::now(),
    }
  }
}

impl AttendanceState {
  // ── Subjects ────────────────────────────────────────────────────────────

  /// Register a subject from a free-form label. Blank labels and keys that
  /// already exist are ignored. Returns the key when something was added.
  pub fn add_subject(&mut self, label: &str) -> Option<String> {
    let label = label.trim();
    let key = normalize(label);
    if key.is_empty() || self.has_subject(&key) {
      return None;
    }
    self.subjects.push(Subject::new(key.clone(), label));
    Some(key)
  }

  pub fn rename_subject(&mut self, key: &str, label: &str) -> bool {
    match self.subjects.iter_mut().find(|s| s.key == key) {
      Some(subject) => {
        subject.label = label.trim().to_owned();
        true
      }
      None => false,
    }
  }

  /// Drop a subject from the list. Recorded entries keep their key and label.
  pub fn remove_subject(&mut self, key: &str) -> bool {
    let before = self.subjects.len();
    self.subjects.retain(|s| s.key != key);
    self.subjects.len() != before
  }

  fn has_subject(&self, key: &str) -> bool {
    self.subjects.iter().any(|s| normalize(&s.key) == key)
  }

  /// Display label for a key: the subject list first, then any recorded
  /// entry, then the key itself.
  pub fn subject_label(&self, key: &str) -> String {
    let key = normalize(key);
    self
      .subjects
      .iter()
      .find(|s| normalize(&s.key) == key)
      .map(|s| s.label.clone())
      .or_else(|| {
        self
          .by_date
          .entries()
          .find(|e| e.subject() == key)
          .map(|e| e.subject_label.clone())
      })
      .unwrap_or(key)
  }

  // ── Plans ───────────────────────────────────────────────────────────────

  pub fn plan(&self, id: &str) -> Option<&Plan> { self.plans.iter().find(|p| p.id == id) }

  pub fn require_plan(&self, id: &str) -> Result<&Plan> {
    self.plan(id).ok_or_else(|| Error::PlanNotFound(id.to_owned()))
  }

  /// Replace the plan with the same id, or insert it at the front. Subjects
  /// the plan uses that are not tracked yet are registered.
  pub fn upsert_plan(&mut self, plan: Plan) {
    let unseen: Vec<(String, String)> = plan
      .subjects()
      .filter(|(key, _)| !key.is_empty())
      .map(|(key, label)| {
        let label = if label.is_empty() { key } else { label };
        (normalize(key), label.to_owned())
      })
      .collect();
    for (key, label) in unseen {
      if !self.has_subject(&key) {
        self.subjects.push(Subject::new(key, label));
      }
    }

    match self.plans.iter_mut().find(|p| p.id == plan.id) {
      Some(existing) => *existing = plan,
      None => self.plans.insert(0, plan),
    }
  }

  pub fn delete_plan(&mut self, id: &str) -> bool {
    let before = self.plans.len();
    self.plans.retain(|p| p.id != id);
    self.plans.len() != before
  }

  // ── Plan fill ───────────────────────────────────────────────────────────

  pub fn fill_day_from_plan(&mut self, plan_id: &str, date: NaiveDate) -> Result<usize> {
    let plan = self.require_plan(plan_id)?.clone();
    Ok(self.by_date.fill_day_from_plan(&plan, date))
  }

  pub fn fill_week_from_plan(&mut self, plan_id: &str, monday: NaiveDate) -> Result<usize> {
    let plan = self.require_plan(plan_id)?.clone();
    Ok(self.by_date.fill_week_from_plan(&plan, monday))
  }
}

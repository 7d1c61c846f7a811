//! Planner-side configuration: per-subject policies and commitments.
//!
//! Both maps are owned by the client and passed to the planner explicitly.
//! Missing entries always fall back to defaults; nothing here can make the
//! planner fail.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::subject::normalize;

pub const DEFAULT_REQUIRED_MARGIN: u32 = 1;
pub const MAX_REQUIRED_MARGIN: u32 = 10;
pub const DEFAULT_TARGET_PERCENT: u8 = 50;

// ─── Subject policy ──────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectPriority {
  /// Never recommend skipping a day with this subject.
  Absolute,
  Preferred,
  #[default]
  Neutral,
  /// Shown for information but ignored when choosing a day's tier.
  Tolerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSetting {
  #[serde(default)]
  pub priority:        SubjectPriority,
  /// Lessons of buffer required beyond the target after a skip.
  #[serde(
    default = "default_margin",
    alias = "margin",
    deserialize_with = "clamped_margin"
  )]
  pub required_margin: u32,
  #[serde(
    default = "default_target",
    alias = "targetPct",
    deserialize_with = "clamped_target"
  )]
  pub target_percent:  u8,
}

fn default_margin() -> u32 { DEFAULT_REQUIRED_MARGIN }

fn default_target() -> u8 { DEFAULT_TARGET_PERCENT }

fn clamped_margin<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
  let raw = f64::deserialize(d)?;
  Ok(raw.round().clamp(0.0, f64::from(MAX_REQUIRED_MARGIN)) as u32)
}

fn clamped_target<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
  let raw = f64::deserialize(d)?;
  Ok(raw.round().clamp(0.0, 100.0) as u8)
}

impl Default for SubjectSetting {
  fn default() -> Self {
    Self {
      priority:        SubjectPriority::Neutral,
      required_margin: DEFAULT_REQUIRED_MARGIN,
      target_percent:  DEFAULT_TARGET_PERCENT,
    }
  }
}

impl SubjectSetting {
  /// Buffer implied by the target alone: `ceil((target/50 - 1) * total)`.
  ///
  /// Negative for targets below 50%. At 100% this equals `total`, i.e. every
  /// remaining lesson must be attended.
  pub fn target_buffer(&self, projected_total: u32) -> i64 {
    let target = i64::from(self.target_percent.min(100));
    div_ceil((target - 50) * i64::from(projected_total), 50)
  }

  /// The buffer a subject must keep after a skip to count as comfortable.
  pub fn effective_margin(&self, projected_total: u32) -> i64 {
    i64::from(self.required_margin.min(MAX_REQUIRED_MARGIN))
      .max(self.target_buffer(projected_total))
  }
}

fn div_ceil(num: i64, den: i64) -> i64 {
  num.div_euclid(den) + i64::from(num.rem_euclid(den) != 0)
}

/// Per-subject settings keyed by normalized subject key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectSettings(BTreeMap<String, SubjectSetting>);

impl SubjectSettings {
  pub fn new() -> Self { Self::default() }

  /// The setting for `key` (normalized before lookup), or the default.
  pub fn get(&self, key: &str) -> SubjectSetting {
    self.0.get(&normalize(key)).copied().unwrap_or_default()
  }

  pub fn priority(&self, key: &str) -> SubjectPriority { self.get(key).priority }

  pub fn set(&mut self, key: &str, setting: SubjectSetting) {
    self.0.insert(normalize(key), setting);
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &SubjectSetting)> { self.0.iter() }
}

// ─── Commitments ─────────────────────────────────────────────────────────────

/// A user's pre-declared decision about a future date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
  /// Locks the day; projected as attended everywhere else.
  Attend,
  /// Already decided to skip; projected as missed everywhere else.
  Absent,
}

/// Date → commitment. An unset date is simply absent from the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commitments(BTreeMap<NaiveDate, Commitment>);

impl Commitments {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, date: NaiveDate) -> Option<Commitment> { self.0.get(&date).copied() }

  pub fn set(&mut self, date: NaiveDate, commitment: Option<Commitment>) {
    match commitment {
      Some(c) => {
        self.0.insert(date, c);
      }
      None => {
        self.0.remove(&date);
      }
    }
  }

  /// Selecting the current value again clears it.
  pub fn toggle(&mut self, date: NaiveDate, commitment: Commitment) -> Option<Commitment> {
    let next = (self.get(date) != Some(commitment)).then_some(commitment);
    self.set(date, next);
    next
  }

  pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Commitment)> + '_ {
    self.0.iter().map(|(d, c)| (*d, *c))
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

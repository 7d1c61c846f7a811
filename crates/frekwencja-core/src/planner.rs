//! The absence planner.
//!
//! For every school day in the look-ahead window the planner asks: "if I
//! skipped this whole day, where would I stand?" The answer is a [`Tier`] plus
//! the numbers behind it.
//!
//! Rules, first match wins:
//!
//! 1. no plan selected → [`Tier::Disabled`]
//! 2. no lessons that weekday → [`Tier::Safe`]
//! 3. a future day already logged in the ledger → [`Tier::Filled`]
//! 4. committed to attend → [`Tier::Locked`]
//! 5. any `ABSOLUTE` subject that day → [`Tier::Priority`]
//! 6. otherwise project the skip on top of the ledger and every other
//!    commitment, then grade the buffers (`2*present - total`) of the
//!    non-tolerated subjects of the day: any negative → `Critical`, any zero
//!    → `Danger`, any below its effective margin → `Warn`, else `Safe`.
//!
//! The planner is a pure function of its inputs. `today` is passed in and
//! only used to pick the window and to recognise future days already logged.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  aggregate::{Breakdown, Tally},
  calendar::{DayName, planning_window},
  ledger::Ledger,
  plan::{Plan, PlanItem},
  settings::{Commitment, Commitments, SubjectPriority, SubjectSettings},
  subject::{Subject, key_or_label, normalize},
};

// ─── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
  Safe,
  Warn,
  Danger,
  Critical,
  Locked,
  Priority,
  Filled,
  Disabled,
}

/// Projected standing of one subject if the day were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProjection {
  pub key:                       String,
  pub label:                     String,
  /// Lessons of this subject on the evaluated day.
  pub lessons:                   u32,
  pub present:                   u32,
  pub total:                     u32,
  pub buffer:                    i64,
  pub tolerated:                 bool,
  pub target_percent:            u8,
  /// Buffer implied by the target alone.
  pub target_buffer:             i64,
  /// `max(requiredMargin, targetBuffer)`.
  pub required_margin:           i64,
  pub projected_percent:         f64,
  pub missing_percent_to_target: f64,
  /// Presences needed afterwards to climb back to the target; `None` when the
  /// target is 100% and a miss is already on record.
  pub lessons_to_target:         Option<u32>,
  /// Below its required margin, or at/under the 50% line.
  pub threatened:                bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorstSubject {
  pub key:    String,
  pub label:  String,
  pub buffer: i64,
}

/// The numbers behind a quantitative tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
  pub global:        Tally,
  pub global_buffer: i64,
  /// The non-tolerated subject with the smallest buffer.
  pub worst:         Option<WorstSubject>,
  /// Every subject taught that day, tolerated ones included, by label.
  pub subjects:      Vec<SubjectProjection>,
}

impl Projection {
  /// Threatened subjects, most at risk first.
  pub fn threatened(&self) -> Vec<&SubjectProjection> {
    let mut out: Vec<_> = self.subjects.iter().filter(|s| s.threatened).collect();
    out.sort_by_key(|s| s.buffer);
    out
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEvaluation {
  pub date:              NaiveDate,
  pub day_name:          DayName,
  pub lessons:           usize,
  pub tier:              Tier,
  pub reason:            String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub absolute_subjects: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub projection:        Option<Projection>,
}

// ─── Planner ─────────────────────────────────────────────────────────────────

/// Planner over one snapshot of the user's data.
///
/// Construction aggregates the whole ledger once; each [`Planner::evaluate`]
/// call then only walks the commitments and one plan day.
pub struct Planner<'a> {
  plan:        Option<&'a Plan>,
  ledger:      &'a Ledger,
  subjects:    &'a [Subject],
  commitments: &'a Commitments,
  settings:    &'a SubjectSettings,
  base:        Breakdown,
}

impl<'a> Planner<'a> {
  pub fn new(
    plan: Option<&'a Plan>,
    ledger: &'a Ledger,
    subjects: &'a [Subject],
    commitments: &'a Commitments,
    settings: &'a SubjectSettings,
  ) -> Self {
    Self {
      plan,
      ledger,
      subjects,
      commitments,
      settings,
      base: Breakdown::of(ledger.entries()),
    }
  }

  /// Evaluate every day of the look-ahead window for `today`, in date order.
  pub fn evaluate_window(&self, today: NaiveDate) -> Vec<DayEvaluation> {
    planning_window(today)
      .into_iter()
      .map(|date| self.evaluate(date, today))
      .collect()
  }

  pub fn evaluate(&self, date: NaiveDate, today: NaiveDate) -> DayEvaluation {
    let day_name = DayName::of(date);
    let verdict = |lessons: usize, tier: Tier, reason: &str| DayEvaluation {
      date,
      day_name,
      lessons,
      tier,
      reason: reason.to_owned(),
      absolute_subjects: Vec::new(),
      projection: None,
    };

    let Some(plan) = self.plan else {
      return verdict(0, Tier::Disabled, "no plan selected");
    };

    let items = plan.items_for_day(day_name);
    let lessons = items.len();
    if items.is_empty() {
      return verdict(0, Tier::Safe, "no lessons");
    }
    if date > today && self.ledger.has_entries(date) {
      return verdict(lessons, Tier::Filled, "day already filled in the ledger");
    }
    if self.commitments.get(date) == Some(Commitment::Attend) {
      return verdict(lessons, Tier::Locked, "planned attendance");
    }

    let mut absolute: Vec<String> = Vec::new();
    for item in items {
      let key = item_key(item);
      if self.settings.priority(&key) == SubjectPriority::Absolute {
        let label = self.label_for(&key, Some(item));
        if !absolute.contains(&label) {
          absolute.push(label);
        }
      }
    }
    if !absolute.is_empty() {
      let mut eval = verdict(
        lessons,
        Tier::Priority,
        &format!("absolute priority: {}", absolute.join(", ")),
      );
      eval.absolute_subjects = absolute;
      return eval;
    }

    let projection = self.project(plan, date, items);
    let tier = grade(&projection);
    let reason = match tier {
      Tier::Safe => "safe to skip",
      Tier::Warn => "very little slack left after skipping",
      Tier::Danger => "at the 50% boundary, no slack",
      _ => "risk of dropping below 50%",
    };

    let mut eval = verdict(lessons, tier, reason);
    eval.projection = Some(projection);
    eval
  }

  /// Base tallies plus every other commitment plus a full miss of `date`.
  fn project(&self, plan: &Plan, date: NaiveDate, items: &[PlanItem]) -> Projection {
    let delta = self.commitment_delta(plan, date);

    let mut day_lessons: BTreeMap<String, u32> = BTreeMap::new();
    let mut day_labels: BTreeMap<String, &PlanItem> = BTreeMap::new();
    for item in items {
      let key = item_key(item);
      *day_lessons.entry(key.clone()).or_default() += 1;
      day_labels.entry(key).or_insert(item);
    }

    let lesson_count = u32::try_from(items.len()).unwrap_or(u32::MAX);
    let global = self.base.global.plus(delta.global).miss(lesson_count);

    let mut worst: Option<WorstSubject> = None;
    let mut subjects = Vec::with_capacity(day_lessons.len());
    for (key, missed) in &day_lessons {
      let after = self
        .base
        .subject(key)
        .plus(delta.subject(key))
        .miss(*missed);
      let setting = self.settings.get(key);
      let tolerated = setting.priority == SubjectPriority::Tolerated;
      let buffer = after.buffer();
      let required_margin = setting.effective_margin(after.total);
      let label = self.label_for(key, day_labels.get(key).copied());
      let projected_percent = after.percent();

      if !tolerated && worst.as_ref().is_none_or(|w| buffer < w.buffer) {
        worst = Some(WorstSubject { key: key.clone(), label: label.clone(), buffer });
      }

      subjects.push(SubjectProjection {
        key: key.clone(),
        label,
        lessons: *missed,
        present: after.present,
        total: after.total,
        buffer,
        tolerated,
        target_percent: setting.target_percent,
        target_buffer: setting.target_buffer(after.total),
        required_margin,
        projected_percent,
        missing_percent_to_target: (f64::from(setting.target_percent) - projected_percent)
          .max(0.0),
        lessons_to_target: after.need_to_reach(setting.target_percent),
        threatened: buffer < required_margin || buffer <= 0,
      });
    }
    subjects.sort_by(|a, b| a.label.cmp(&b.label));

    Projection { global, global_buffer: global.buffer(), worst, subjects }
  }

  /// Tallies contributed by commitments on dates other than `exclude`.
  ///
  /// `attend` counts as present, `absent` as a miss. Dates that already have
  /// ledger rows are skipped: their real entries are in the base tallies.
  fn commitment_delta(&self, plan: &Plan, exclude: NaiveDate) -> Breakdown {
    let mut delta = Breakdown::default();
    for (date, commitment) in self.commitments.iter() {
      if date == exclude || self.ledger.has_entries(date) {
        continue;
      }
      for item in plan.lessons_on(date) {
        delta.record(item_key(item), commitment == Commitment::Attend);
      }
    }
    delta
  }

  fn label_for(&self, key: &str, item: Option<&PlanItem>) -> String {
    self
      .subjects
      .iter()
      .find(|s| normalize(&s.key) == key)
      .map(|s| s.label.clone())
      .or_else(|| {
        item
          .map(|it| it.subject_label.clone())
          .filter(|l| !l.is_empty())
      })
      .unwrap_or_else(|| key.to_owned())
  }
}

fn item_key(item: &PlanItem) -> String { key_or_label(&item.subject_key, &item.subject_label) }

/// Worst case wins across the day's non-tolerated subjects.
fn grade(projection: &Projection) -> Tier {
  let graded = projection.subjects.iter().filter(|s| !s.tolerated);
  let mut tier = Tier::Safe;
  for s in graded {
    let this = if s.buffer < 0 {
      Tier::Critical
    } else if s.buffer == 0 {
      Tier::Danger
    } else if s.buffer < s.required_margin {
      Tier::Warn
    } else {
      Tier::Safe
    };
    tier = tier.max(this);
  }
  tier
}

/// Convenience wrapper around [`Planner::evaluate_window`].
pub fn evaluate_window(
  plan: Option<&Plan>,
  ledger: &Ledger,
  subjects: &[Subject],
  commitments: &Commitments,
  settings: &SubjectSettings,
  today: NaiveDate,
) -> Vec<DayEvaluation> {
  Planner::new(plan, ledger, subjects, commitments, settings).evaluate_window(today)
}

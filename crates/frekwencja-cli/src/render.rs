//! Plain-text rendering of summaries, planner windows and plan lists.

use std::fmt::Write as _;

use frekwencja_core::{
  aggregate::{Breakdown, EntryFilter, Tally},
  plan::{Plan, display_names},
  planner::{DayEvaluation, Tier},
  state::AttendanceState,
};

pub fn tier_label(tier: Tier) -> &'static str {
  match tier {
    Tier::Safe => "safe",
    Tier::Warn => "warn",
    Tier::Danger => "danger",
    Tier::Critical => "critical",
    Tier::Locked => "locked",
    Tier::Priority => "priority",
    Tier::Filled => "filled",
    Tier::Disabled => "disabled",
  }
}

fn tally_line(t: Tally) -> String {
  format!("{}/{} ({:.1}%)", t.present, t.total, t.percent())
}

// ─── Summary ─────────────────────────────────────────────────────────────────

pub fn summary(state: &AttendanceState, filter: &EntryFilter, target: Option<u8>) -> String {
  let breakdown = Breakdown::of(state.by_date.entries().filter(|e| filter.matches(e)));
  let t = breakdown.global;

  let mut out = String::new();
  let _ = writeln!(out, "Attendance: {}", tally_line(t));
  let _ = writeln!(
    out,
    "To reach 50%: {}   Can skip and keep 50%: {}",
    t.need_to_reach_50(),
    t.can_skip_and_keep_50()
  );
  if let Some(target) = target {
    let need = t
      .need_to_reach(target)
      .map_or_else(|| "unreachable".to_string(), |n| n.to_string());
    let margin = t
      .margin_above(target)
      .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
    let _ = writeln!(out, "Target {target}%: need {need}, margin {margin}");
  }

  if !breakdown.per_subject.is_empty() {
    let _ = writeln!(out);
    for (key, tally) in &breakdown.per_subject {
      let _ = writeln!(
        out,
        "  {:<24} {:<16} buffer {:+}",
        state.subject_label(key),
        tally_line(*tally),
        tally.buffer()
      );
    }
  }
  out
}

// ─── Planner ─────────────────────────────────────────────────────────────────

pub fn planner(days: &[DayEvaluation], verbose: bool) -> String {
  let mut out = String::new();
  for day in days {
    let _ = writeln!(
      out,
      "{} {:<12} {:<8} {}",
      day.date,
      day.day_name.to_string(),
      tier_label(day.tier),
      day.reason
    );
    let Some(projection) = &day.projection else {
      continue;
    };
    if verbose {
      let _ = writeln!(
        out,
        "    after skipping: {} buffer {:+}",
        tally_line(projection.global),
        projection.global_buffer
      );
    }
    for subject in projection.threatened() {
      let _ = writeln!(
        out,
        "    ! {} {}/{} buffer {:+} (needs {:+})",
        subject.label, subject.present, subject.total, subject.buffer, subject.required_margin
      );
    }
  }
  out
}

// ─── Plans ───────────────────────────────────────────────────────────────────

pub fn plans(plans: &[Plan], selected: Option<&str>) -> String {
  if plans.is_empty() {
    return "no plans\n".to_string();
  }
  let names = display_names(plans);
  let mut out = String::new();
  for plan in plans {
    let marker = if Some(plan.id.as_str()) == selected { '*' } else { ' ' };
    let lessons: usize = plan.days.values().map(|d| d.items.len()).sum();
    let name = names.get(&plan.id).map_or(plan.name.as_str(), String::as_str);
    let _ = writeln!(out, "{marker} {} {name} ({lessons} lessons/week)", plan.id);
  }
  out
}

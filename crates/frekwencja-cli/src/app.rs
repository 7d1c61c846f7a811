//! Command implementations over the local cache.
//!
//! Every mutation is saved to the cache first. Ledger and plan changes are
//! then handed to the [`SyncQueue`]; commitments and settings stay local.
//! `mark` is the one remote-first command: it patches a single entry with its
//! version tag and rolls the cache back if the server refuses.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use frekwencja_core::{
  Error as CoreError,
  aggregate::EntryFilter,
  calendar::{parse_date, week_monday},
  entry::date_of_id,
  plan::{Plan, ensure_unique_name},
  planner::Planner,
  settings::{Commitment, MAX_REQUIRED_MARGIN, SubjectPriority},
  subject::normalize,
};
use tracing::info;

use crate::{
  cache::{LocalCache, LocalData},
  client::{ApiClient, PatchItem, PatchOutcome},
  render,
  sync::{DEBOUNCE, SyncQueue},
};

pub struct App {
  pub cache: LocalCache,
  client:    Option<ApiClient>,
  queue:     Option<SyncQueue>,
}

/// Optional changes to one subject's planner settings.
#[derive(Debug, Default)]
pub struct SettingChange {
  pub priority:        Option<SubjectPriority>,
  pub required_margin: Option<u32>,
  pub target_percent:  Option<u8>,
}

fn parse_opt_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
  Ok(raw.map(parse_date).transpose()?)
}

impl App {
  /// `client` is `None` when working offline. Must be called inside a tokio
  /// runtime when a client is given.
  pub fn new(cache: LocalCache, client: Option<ApiClient>) -> Self {
    let queue = client.clone().map(|c| SyncQueue::spawn(c, DEBOUNCE));
    Self { cache, client, queue }
  }

  fn remote(&self) -> Result<&ApiClient> {
    self
      .client
      .as_ref()
      .ok_or_else(|| anyhow!("no server configured; pass --url or set FREKWENCJA_URL"))
  }

  /// Save the cache and schedule a push of the synced state.
  fn commit_state(&mut self) -> Result<()> {
    self.cache.save()?;
    if let Some(queue) = &self.queue {
      queue.enqueue(self.cache.data.state.clone());
    }
    Ok(())
  }

  fn plan_id(&self, requested: Option<&str>) -> Result<String> {
    match self.cache.active_plan(requested) {
      Some(plan) => Ok(plan.id.clone()),
      None => match requested.or(self.cache.data.selected_plan.as_deref()) {
        Some(id) => Err(CoreError::PlanNotFound(id.to_owned()).into()),
        None => bail!("no plans yet; add one with `frek import-plan <file>`"),
      },
    }
  }

  // ── Sync ────────────────────────────────────────────────────────────────

  pub async fn pull(&mut self) -> Result<String> {
    let state = self.remote()?.get_state().await?;
    let entries = state.by_date.len();
    let version = state.version;
    self.cache.data.state = state;
    if let Some(id) = &self.cache.data.selected_plan
      && self.cache.data.state.plan(id).is_none()
    {
      self.cache.data.selected_plan = None;
    }
    self.cache.save()?;
    info!(version, entries, "pulled remote state");
    Ok(format!("pulled version {version} ({entries} entries)"))
  }

  pub async fn push(&mut self) -> Result<String> {
    let saved = self.remote()?.put_state(&self.cache.data.state).await?;
    self.cache.data.state.version = saved.version;
    self.cache.data.state.updated_at = saved.updated_at;
    self.cache.save()?;
    Ok(format!("pushed; server is at version {}", saved.version))
  }

  /// Flush pending pushes. Returns a warning when sync had to be disabled.
  pub async fn finish(mut self) -> Result<Option<String>> {
    let Some(queue) = self.queue.take() else {
      return Ok(None);
    };
    let report = queue.finish().await?;
    if let Some(version) = report.version {
      self.cache.data.state.version = version;
      self.cache.save()?;
    }
    Ok(report.disabled.then(|| {
      "remote sync failed; changes are kept locally (run `frek push` later)".to_string()
    }))
  }

  // ── Read-only views ─────────────────────────────────────────────────────

  pub fn summary(
    &self,
    from: Option<&str>,
    to: Option<&str>,
    subject: Option<&str>,
    target: Option<u8>,
  ) -> Result<String> {
    if let Some(t) = target
      && t > 100
    {
      bail!("target must be 0..=100, got {t}");
    }
    let filter = EntryFilter {
      from:        parse_opt_date(from)?,
      to:          parse_opt_date(to)?,
      subject_key: subject.map(str::to_owned),
    };
    Ok(render::summary(&self.cache.data.state, &filter, target))
  }

  pub fn planner(&self, today: Option<&str>, plan: Option<&str>, verbose: bool) -> Result<String> {
    let today = parse_opt_date(today)?.unwrap_or_else(|| Local::now().date_naive());
    let plan = match plan {
      Some(id) => Some(self.cache.data.state.require_plan(id)?),
      None => self.cache.active_plan(None),
    };
    let data = &self.cache.data;
    let days = Planner::new(
      plan,
      &data.state.by_date,
      &data.state.subjects,
      &data.commitments,
      &data.settings,
    )
    .evaluate_window(today);
    Ok(render::planner(&days, verbose))
  }

  pub fn plans(&mut self, select: Option<&str>) -> Result<String> {
    if let Some(id) = select {
      self.cache.data.state.require_plan(id)?;
      self.cache.data.selected_plan = Some(id.to_owned());
      self.cache.save()?;
    }
    Ok(render::plans(
      &self.cache.data.state.plans,
      self.cache.active_plan(None).map(|p| p.id.as_str()),
    ))
  }

  // ── Local-only settings ─────────────────────────────────────────────────

  pub fn commit(&mut self, date: &str, choice: Option<Commitment>) -> Result<String> {
    let date = parse_date(date)?;
    self.cache.data.commitments.set(date, choice);
    self.cache.save()?;
    Ok(match choice {
      Some(Commitment::Attend) => format!("{date}: will attend"),
      Some(Commitment::Absent) => format!("{date}: will be absent"),
      None => format!("{date}: cleared"),
    })
  }

  pub fn setting(&mut self, subject: &str, change: SettingChange) -> Result<String> {
    let key = normalize(subject);
    if key.is_empty() {
      bail!("subject name is empty");
    }
    let mut setting = self.cache.data.settings.get(&key);
    if let Some(priority) = change.priority {
      setting.priority = priority;
    }
    if let Some(margin) = change.required_margin {
      setting.required_margin = margin.min(MAX_REQUIRED_MARGIN);
    }
    if let Some(target) = change.target_percent {
      setting.target_percent = target.min(100);
    }
    self.cache.data.settings.set(&key, setting);
    self.cache.save()?;
    Ok(format!(
      "{}: {:?}, margin {}, target {}%",
      self.cache.data.state.subject_label(&key),
      setting.priority,
      setting.required_margin,
      setting.target_percent
    ))
  }

  // ── Ledger edits ────────────────────────────────────────────────────────

  pub fn fill_day(&mut self, date: &str, plan: Option<&str>) -> Result<String> {
    let date = parse_date(date)?;
    let id = self.plan_id(plan)?;
    let added = self.cache.data.state.fill_day_from_plan(&id, date)?;
    self.commit_state()?;
    Ok(format!("{date}: added {added} lessons"))
  }

  pub fn fill_week(&mut self, date: &str, plan: Option<&str>) -> Result<String> {
    let monday = week_monday(parse_date(date)?);
    let id = self.plan_id(plan)?;
    let added = self.cache.data.state.fill_week_from_plan(&id, monday)?;
    self.commit_state()?;
    Ok(format!("week of {monday}: added {added} lessons"))
  }

  pub fn toggle(&mut self, id: &str) -> Result<String> {
    let date = date_of_id(id)?;
    let present = self.cache.data.state.by_date.toggle_present(date, id)?;
    self.commit_state()?;
    Ok(format!("{id}: {}", if present { "present" } else { "absent" }))
  }

  /// Set one entry remotely, guarded by its version; local-only when offline.
  pub async fn mark(&mut self, id: &str, present: bool) -> Result<String> {
    let before = self.cache.data.state.clone();
    let entry = before
      .by_date
      .find(id)
      .ok_or_else(|| CoreError::EntryNotFound(id.to_owned()))?;
    let (expected, tag) = (entry.version, entry.version_tag());

    self.cache.data.state.by_date.update_entry(id, present, Some(expected))?;
    self.cache.save()?;

    let Some(client) = &self.client else {
      return Ok(format!("{id}: saved locally"));
    };
    let outcome = client
      .patch_entries(vec![PatchItem {
        id:       id.to_owned(),
        present,
        if_match: Some(tag),
      }])
      .await;

    match outcome {
      Ok(PatchOutcome::Updated(0)) => Ok(format!("{id}: saved locally (not on the server yet)")),
      Ok(PatchOutcome::Updated(_)) => Ok(format!("{id}: saved")),
      Ok(PatchOutcome::Conflict(msg)) => {
        self.rollback(before)?;
        bail!("{msg}; local change rolled back, run `frek pull`")
      }
      Err(e) => {
        self.rollback(before)?;
        Err(e.context("local change rolled back"))
      }
    }
  }

  fn rollback(&mut self, before: frekwencja_core::state::AttendanceState) -> Result<()> {
    self.cache.data.state = before;
    self.cache.save()
  }

  // ── Plans & reset ───────────────────────────────────────────────────────

  /// Add a plan from its JSON form, renaming it when the name is taken.
  pub fn import_plan(&mut self, raw: &str) -> Result<String> {
    let mut plan: Plan = serde_json::from_str(raw).context("parsing plan JSON")?;
    let others: Vec<Plan> = self
      .cache
      .data
      .state
      .plans
      .iter()
      .filter(|p| p.id != plan.id)
      .cloned()
      .collect();
    plan.name = ensure_unique_name(&others, &plan.name);

    let (id, name) = (plan.id.clone(), plan.name.clone());
    self.cache.data.state.upsert_plan(plan);
    if self.cache.data.selected_plan.is_none() {
      self.cache.data.selected_plan = Some(id.clone());
    }
    self.commit_state()?;
    Ok(format!("imported {name} ({id})"))
  }

  /// Drop everything, local-only data included.
  pub fn reset(&mut self) -> Result<String> {
    self.cache.data = LocalData::default();
    self.commit_state()?;
    Ok("reset to defaults".to_string())
  }
}

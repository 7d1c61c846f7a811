//! Day- and week-level bulk operations.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attendance/days/{date}/present` | Body: `{"present":bool}` |
//! | `POST` | `/attendance/days/{date}/apply-plan` | Body: `{"planId","overwrite"?,"setPresent"?}`; 409 if the day is logged |
//! | `POST` | `/attendance/weeks/{monday}/fill` | Body: `{"planId"}`; skips lessons already logged |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use frekwencja_core::{
  calendar::{parse_date, school_week, week_monday},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{entries::Updated, error::ApiError, user::CurrentUser};

// ─── Presence ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PresentBody {
  pub present: bool,
}

/// `POST /attendance/days/{date}/present`
pub async fn set_present<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Path(date): Path<String>,
  Json(body): Json<PresentBody>,
) -> Result<Json<Updated>, ApiError>
where
  S: AttendanceStore,
{
  let date = parse_date(&date)?;
  let updated = store
    .set_day_present(&user, date, body.present)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Updated { updated }))
}

// ─── Apply plan ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPlanBody {
  pub plan_id:     String,
  #[serde(default)]
  pub overwrite:   bool,
  #[serde(default = "default_present")]
  pub set_present: bool,
}

fn default_present() -> bool { true }

#[derive(Debug, Serialize, Deserialize)]
pub struct Applied {
  pub created:     usize,
  pub overwritten: usize,
}

/// `POST /attendance/days/{date}/apply-plan`: build the day fresh from a plan.
pub async fn apply_plan<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Path(date): Path<String>,
  Json(body): Json<ApplyPlanBody>,
) -> Result<Json<Applied>, ApiError>
where
  S: AttendanceStore,
{
  let date = parse_date(&date)?;
  let state = store.load_state(&user).await.map_err(ApiError::from_store)?;
  let plan = state.require_plan(&body.plan_id)?;

  let fresh = plan.materialize_day(date, body.set_present);
  if fresh.is_empty() {
    return Err(ApiError::BadRequest(format!(
      "plan {} has no lessons on {date}",
      body.plan_id
    )));
  }
  if state.by_date.has_entries(date) && !body.overwrite {
    return Err(ApiError::Conflict(format!(
      "{date} already has entries; pass overwrite=true to replace them"
    )));
  }

  let created = fresh.len();
  let overwritten = store
    .replace_day(&user, date, fresh)
    .await
    .map_err(ApiError::from_store)?;
  info!(%user, %date, created, overwritten, "applied plan to day");
  Ok(Json(Applied { created, overwritten }))
}

// ─── Week fill ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBody {
  pub plan_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
  pub created: usize,
}

/// `POST /attendance/weeks/{monday}/fill`: any date of the week is accepted
/// and snapped to its Monday.
pub async fn fill_week<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Path(monday): Path<String>,
  Json(body): Json<FillBody>,
) -> Result<Json<Created>, ApiError>
where
  S: AttendanceStore,
{
  let monday = week_monday(parse_date(&monday)?);
  let state = store.load_state(&user).await.map_err(ApiError::from_store)?;
  let plan = state.require_plan(&body.plan_id)?;

  let rows = school_week(monday)
    .flat_map(|date| plan.materialize_day(date, true))
    .collect();
  let created = store
    .add_entries(&user, rows)
    .await
    .map_err(ApiError::from_store)?;
  info!(%user, %monday, created, "filled week from plan");
  Ok(Json(Created { created }))
}

//! Handler for `POST /attendance/planner`.
//!
//! Commitments and subject settings are client-owned, so they travel in the
//! request body; the ledger, the plans and the subject list come from the
//! store.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
};
use chrono::{Local, NaiveDate};
use frekwencja_core::{
  calendar::parse_date,
  planner::{DayEvaluation, Planner},
  settings::{Commitments, SubjectSettings},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, user::CurrentUser};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerBody {
  /// No plan selected disables the planner.
  pub plan_id:     Option<String>,
  #[serde(default)]
  pub commitments: Commitments,
  #[serde(default)]
  pub settings:    SubjectSettings,
  /// `YYYY-MM-DD`; the server's local date when absent.
  pub today:       Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlannerResponse {
  pub today: NaiveDate,
  pub days:  Vec<DayEvaluation>,
}

/// `POST /attendance/planner`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<PlannerBody>,
) -> Result<Json<PlannerResponse>, ApiError>
where
  S: AttendanceStore,
{
  let today = match body.today.as_deref() {
    Some(s) => parse_date(s)?,
    None => Local::now().date_naive(),
  };

  let state = store.load_state(&user).await.map_err(ApiError::from_store)?;
  let plan = body
    .plan_id
    .as_deref()
    .map(|id| state.require_plan(id))
    .transpose()?;

  let days = Planner::new(
    plan,
    &state.by_date,
    &state.subjects,
    &body.commitments,
    &body.settings,
  )
  .evaluate_window(today);
  Ok(Json(PlannerResponse { today, days }))
}

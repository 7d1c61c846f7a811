//! Handler for `GET /attendance/summary`.
//!
//! Always recomputed from the stored ledger. With `?target=<percent>` the
//! response also carries the general-target numbers.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use frekwencja_core::{
  aggregate::{AttendanceSummary, tally},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};

use crate::{entries::FilterParams, error::ApiError, user::CurrentUser};

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  #[serde(flatten)]
  pub filter: FilterParams,
  pub target: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetNumbers {
  pub target_percent:       u8,
  /// `null` when the target can no longer be reached.
  pub need_to_reach_target: Option<u32>,
  /// `null` when any number of absences keeps the target (a 0% target).
  pub margin_above_target:  Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
  #[serde(flatten)]
  pub summary: AttendanceSummary,
  #[serde(flatten)]
  pub target:  Option<TargetNumbers>,
}

/// `GET /attendance/summary[?from=..][&to=..][&subjectKey=..][&target=..]`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResponse>, ApiError>
where
  S: AttendanceStore,
{
  if let Some(t) = params.target
    && t > 100
  {
    return Err(ApiError::BadRequest(format!("target must be 0..=100, got {t}")));
  }
  let filter = params.filter.into_filter()?;

  let state = store.load_state(&user).await.map_err(ApiError::from_store)?;
  let t = tally(state.by_date.entries(), &filter);

  Ok(Json(SummaryResponse {
    summary: t.into(),
    target:  params.target.map(|target| TargetNumbers {
      target_percent:       target,
      need_to_reach_target: t.need_to_reach(target),
      margin_above_target:  t.margin_above(target),
    }),
  }))
}

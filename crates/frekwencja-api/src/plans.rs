//! Handler for `GET /attendance/plans`.

use std::sync::Arc;

use axum::{Json, extract::State};
use frekwencja_core::{
  plan::{Plan, display_names},
  store::AttendanceStore,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, user::CurrentUser};

/// A plan plus the name to show for it when several share a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanListing {
  #[serde(flatten)]
  pub plan:         Plan,
  pub display_name: String,
}

/// `GET /attendance/plans`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PlanListing>>, ApiError>
where
  S: AttendanceStore,
{
  let plans = store.list_plans(&user).await.map_err(ApiError::from_store)?;
  let mut names = display_names(&plans);
  let listings = plans
    .into_iter()
    .map(|plan| PlanListing {
      display_name: names.remove(&plan.id).unwrap_or_else(|| plan.name.clone()),
      plan,
    })
    .collect();
  Ok(Json(listings))
}

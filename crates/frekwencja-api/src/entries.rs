//! Handlers for `/attendance/entries`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/attendance/entries` | `from`, `to`, `subjectKey`, `cursor`, `limit` (1..=200, default 50) |
//! | `PATCH` | `/attendance/entries` | Body: `{"updates":[{"id","present","ifMatch"?}]}`; 409 on a stale `ifMatch` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use frekwencja_core::{
  aggregate::EntryFilter,
  calendar::parse_date,
  entry::parse_version_tag,
  ledger::EntryUpdate,
  store::{AttendanceStore, EntryPage, EntryQuery},
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, user::CurrentUser};

// ─── Filter params ───────────────────────────────────────────────────────────

/// Date range and subject, shared by the list and summary endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
  pub from:        Option<String>,
  pub to:          Option<String>,
  pub subject_key: Option<String>,
}

impl FilterParams {
  pub fn into_filter(self) -> Result<EntryFilter, ApiError> {
    Ok(EntryFilter {
      from:        self.from.as_deref().map(parse_date).transpose()?,
      to:          self.to.as_deref().map(parse_date).transpose()?,
      subject_key: self.subject_key.filter(|k| !k.trim().is_empty()),
    })
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(flatten)]
  pub filter: FilterParams,
  pub cursor: Option<String>,
  pub limit:  Option<usize>,
}

/// `GET /attendance/entries[?from=..][&to=..][&subjectKey=..][&cursor=..][&limit=..]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<EntryPage>, ApiError>
where
  S: AttendanceStore,
{
  let query = EntryQuery {
    filter: params.filter.into_filter()?,
    cursor: params.cursor,
    limit:  params.limit,
  };
  let page = store
    .list_entries(&user, &query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}

// ─── Patch ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
  pub id:       String,
  pub present:  bool,
  /// The entry version the client last saw, as `"v3"`, `v3` or `3`.
  pub if_match: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchBody {
  pub updates: Vec<UpdateItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Updated {
  pub updated: usize,
}

/// `PATCH /attendance/entries`, all-or-nothing.
pub async fn patch<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<PatchBody>,
) -> Result<Json<Updated>, ApiError>
where
  S: AttendanceStore,
{
  let updates = body
    .updates
    .into_iter()
    .map(|u| {
      Ok(EntryUpdate {
        expected_version: u.if_match.as_deref().map(parse_version_tag).transpose()?,
        id:               u.id,
        present:          u.present,
      })
    })
    .collect::<Result<Vec<_>, ApiError>>()?;

  let updated = store
    .update_entries(&user, &updates)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Updated { updated }))
}

//! Handlers for the whole-state `/attendance` endpoint.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/attendance` | Full state; default state if none stored. Sets `ETag` |
//! | `PUT`  | `/attendance` | Replace the state (last write wins). Honours `If-Match` |

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, header},
  response::IntoResponse,
};
use frekwencja_core::{state::AttendanceState, store::AttendanceStore};
use tracing::{debug, warn};

use crate::{
  error::ApiError,
  etag::{compute_etag, strip_etag_quotes},
  user::CurrentUser,
};

/// `GET /attendance`
pub async fn get_state<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  let state = store.load_state(&user).await.map_err(ApiError::from_store)?;
  let etag = compute_etag(&state);
  Ok(([(header::ETAG, etag)], Json(state)))
}

/// `PUT /attendance`: body is a complete [`AttendanceState`].
///
/// With `If-Match`, the write is rejected with 412 unless the tag matches the
/// stored state. Without it the write simply wins.
pub async fn put_state<S>(
  State(store): State<Arc<S>>,
  CurrentUser(user): CurrentUser,
  headers: HeaderMap,
  Json(body): Json<AttendanceState>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
{
  let if_match = headers
    .get(header::IF_MATCH)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned);

  if let Some(expected) = if_match.as_deref()
    && expected.trim() != "*"
  {
    let current = store.load_state(&user).await.map_err(ApiError::from_store)?;
    let current_etag = compute_etag(&current);
    if strip_etag_quotes(&current_etag) != strip_etag_quotes(expected) {
      warn!(%user, "stale If-Match on state replace");
      return Err(ApiError::PreconditionFailed);
    }
  }

  let saved = store
    .save_state(&user, body)
    .await
    .map_err(ApiError::from_store)?;
  debug!(%user, version = saved.version, "replaced attendance state");
  let etag = compute_etag(&saved);
  Ok(([(header::ETAG, etag)], Json(saved)))
}

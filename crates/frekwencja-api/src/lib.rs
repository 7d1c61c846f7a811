//! JSON REST API for Frekwencja.
//!
//! Exposes an axum [`Router`] backed by any
//! [`frekwencja_core::store::AttendanceStore`]. Authentication is the
//! caller's responsibility: a layer in front of this router must insert a
//! [`CurrentUser`] into the request extensions.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", frekwencja_api::api_router(store.clone()))
//! ```

pub mod attendance;
pub mod days;
pub mod entries;
pub mod error;
pub mod etag;
pub mod planner;
pub mod plans;
pub mod summary;
pub mod user;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use frekwencja_core::store::AttendanceStore;

pub use error::ApiError;
pub use user::CurrentUser;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AttendanceStore + 'static,
{
  Router::new()
    // Whole state
    .route("/attendance", get(attendance::get_state::<S>).put(attendance::put_state::<S>))
    // Entries
    .route("/attendance/entries", get(entries::list::<S>).patch(entries::patch::<S>))
    .route("/attendance/summary", get(summary::handler::<S>))
    // Bulk day/week operations
    .route("/attendance/days/{date}/present", post(days::set_present::<S>))
    .route("/attendance/days/{date}/apply-plan", post(days::apply_plan::<S>))
    .route("/attendance/weeks/{monday}/fill", post(days::fill_week::<S>))
    // Plans and planner
    .route("/attendance/plans", get(plans::list::<S>))
    .route("/attendance/planner", post(planner::handler::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;

//! The authenticated user a request acts for.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Inserted into request extensions by the server's auth layer. Every
/// attendance handler reads and writes the state of this user only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<CurrentUser>()
      .cloned()
      .ok_or(ApiError::Unauthorized)
  }
}

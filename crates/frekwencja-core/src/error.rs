//! Error types for `frekwencja-core`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// The caller's expected entry version no longer matches the stored one.
  /// Recoverable: refresh the entry and retry.
  #[error("version conflict on entry {id}: expected v{expected}, found v{actual}")]
  VersionConflict {
    id:       String,
    expected: u32,
    actual:   u32,
  },

  #[error("entry not found: {0}")]
  EntryNotFound(String),

  #[error("plan not found: {0}")]
  PlanNotFound(String),

  #[error("invalid date: {0:?} (expected YYYY-MM-DD)")]
  InvalidDate(String),

  #[error("invalid version tag: {0:?}")]
  InvalidVersionTag(String),

  #[error("unknown day name: {0:?}")]
  UnknownDayName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

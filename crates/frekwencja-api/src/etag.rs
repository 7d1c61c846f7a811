//! ETag computation for the whole attendance state.
//!
//! ETags are SHA-256 hashes over the state version, its update time and the
//! sorted `(entry id, entry version)` pairs, so any entry-level write changes
//! the tag even when the state row itself was not rewritten.

use frekwencja_core::state::AttendanceState;
use sha2::{Digest, Sha256};

/// Stable: the same entries in any order give the same tag.
pub fn compute_etag(state: &AttendanceState) -> String {
  let mut pairs: Vec<(&str, u32)> = state
    .by_date
    .entries()
    .map(|e| (e.id.as_str(), e.version))
    .collect();
  pairs.sort_unstable();

  let mut hasher = Sha256::new();
  hasher.update(state.version.to_le_bytes());
  hasher.update(state.updated_at.timestamp_millis().to_le_bytes());
  for (id, version) in pairs {
    hasher.update(id.as_bytes());
    hasher.update([0]);
    hasher.update(version.to_le_bytes());
  }
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Strip surrounding double-quotes (and a weak `W/` prefix) from an ETag.
pub fn strip_etag_quotes(etag: &str) -> &str {
  let etag = etag.trim();
  let etag = etag.strip_prefix("W/").unwrap_or(etag);
  etag.trim_matches('"')
}

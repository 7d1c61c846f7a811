//! The local-first JSON cache.
//!
//! Holds the synced [`AttendanceState`] together with the data that never
//! leaves the device: commitments, subject settings and the selected plan.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use frekwencja_core::{
  plan::Plan,
  settings::{Commitments, SubjectSettings},
  state::AttendanceState,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const FILE_NAME: &str = "frekwencja.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalData {
  #[serde(default)]
  pub state:         AttendanceState,
  #[serde(default)]
  pub commitments:   Commitments,
  #[serde(default)]
  pub settings:      SubjectSettings,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub selected_plan: Option<String>,
}

pub struct LocalCache {
  path:     PathBuf,
  pub data: LocalData,
}

impl LocalCache {
  /// Load the cache from `dir`; a missing file yields fresh defaults.
  pub fn open(dir: &Path) -> Result<Self> {
    let path = dir.join(FILE_NAME);
    let data = match std::fs::read_to_string(&path) {
      Ok(raw) => serde_json::from_str(&raw)
        .with_context(|| format!("parsing local cache {}", path.display()))?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalData::default(),
      Err(e) => {
        return Err(e).with_context(|| format!("reading local cache {}", path.display()));
      }
    };
    Ok(Self { path, data })
  }

  /// Write the cache atomically (temp file + rename).
  pub fn save(&self) -> Result<()> {
    if let Some(dir) = self.path.parent() {
      std::fs::create_dir_all(dir)
        .with_context(|| format!("creating data dir {}", dir.display()))?;
    }
    let raw = serde_json::to_string_pretty(&self.data).context("serialising local cache")?;
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, &self.path)
      .with_context(|| format!("replacing {}", self.path.display()))?;
    debug!(path = %self.path.display(), "saved local cache");
    Ok(())
  }

  /// The plan to use when none is named: the selected one, else the newest.
  pub fn active_plan(&self, requested: Option<&str>) -> Option<&Plan> {
    match requested.or(self.data.selected_plan.as_deref()) {
      Some(id) => self.data.state.plan(id),
      None => self.data.state.plans.first(),
    }
  }
}

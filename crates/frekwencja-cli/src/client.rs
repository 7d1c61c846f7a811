//! Async HTTP client wrapping the frekwencja JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use frekwencja_core::state::AttendanceState;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Connection settings for the frekwencja API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the frekwencja JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// One item of a `PATCH /attendance/entries` batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchItem {
  pub id:       String,
  pub present:  bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub if_match: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
  Updated(usize),
  /// The server holds a newer version of at least one entry.
  Conflict(String),
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Deserialize)]
struct Updated {
  updated: usize,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api/v1{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  // ── Whole state ───────────────────────────────────────────────────────────

  /// `GET /api/v1/attendance`
  pub async fn get_state(&self) -> Result<AttendanceState> {
    let resp = self
      .auth(self.client.get(self.url("/attendance")))
      .send()
      .await
      .context("GET /attendance failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /attendance → {}", resp.status()));
    }
    resp.json().await.context("deserialising attendance state")
  }

  /// `PUT /api/v1/attendance`: last write wins. Returns the stored state.
  pub async fn put_state(&self, state: &AttendanceState) -> Result<AttendanceState> {
    let resp = self
      .auth(self.client.put(self.url("/attendance")))
      .json(state)
      .send()
      .await
      .context("PUT /attendance failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("PUT /attendance → {}", resp.status()));
    }
    resp.json().await.context("deserialising saved state")
  }

  // ── Entries ───────────────────────────────────────────────────────────────

  /// `PATCH /api/v1/attendance/entries`
  pub async fn patch_entries(&self, updates: Vec<PatchItem>) -> Result<PatchOutcome> {
    let resp = self
      .auth(self.client.patch(self.url("/attendance/entries")))
      .json(&serde_json::json!({ "updates": updates }))
      .send()
      .await
      .context("PATCH /attendance/entries failed")?;

    match resp.status() {
      StatusCode::CONFLICT => {
        let body: ErrorBody = resp.json().await.context("deserialising conflict")?;
        Ok(PatchOutcome::Conflict(body.error))
      }
      status if status.is_success() => {
        let body: Updated = resp.json().await.context("deserialising patch result")?;
        Ok(PatchOutcome::Updated(body.updated))
      }
      status => Err(anyhow!("PATCH /attendance/entries → {status}")),
    }
  }
}

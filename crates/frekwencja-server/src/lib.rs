//! HTTP server for Frekwencja.
//!
//! Wraps [`frekwencja_api::api_router`] with Basic auth and request tracing,
//! and adds an unauthenticated health check.

pub mod auth;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use argon2::PasswordHash;
use axum::{Json, Router, middleware, routing::get};
use frekwencja_core::store::AttendanceStore;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Where the JSON API is mounted.
pub const API_PREFIX: &str = "/api/v1";

/// Runtime server configuration, deserialised from `config.toml` and
/// `FREKWENCJA_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default)]
  pub auth_username:      String,
  #[serde(default)]
  pub auth_password_hash: String,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/frekwencja/attendance.db") }

impl ServerConfig {
  pub fn bind_address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The SQLite file, with a leading `~` expanded.
  pub fn store_file(&self) -> PathBuf { expand_tilde(&self.store_path) }

  /// The credentials to enforce. Both settings are required and the hash must
  /// be a PHC string, so a typo fails at startup instead of on every request.
  pub fn auth_config(&self) -> anyhow::Result<AuthConfig> {
    if self.auth_username.trim().is_empty() {
      bail!("auth_username is not set (config file or FREKWENCJA_AUTH_USERNAME)");
    }
    if self.auth_password_hash.trim().is_empty() {
      bail!(
        "auth_password_hash is not set (config file or FREKWENCJA_AUTH_PASSWORD_HASH); \
         generate one with --hash-password"
      );
    }
    PasswordHash::new(&self.auth_password_hash)
      .map_err(|e| anyhow::anyhow!("{e}"))
      .context("auth_password_hash is not an argon2 PHC string")?;
    Ok(AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    })
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Application state ────────────────────────────────────────────────────────

pub struct AppState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server router: `/health` plus the API under [`API_PREFIX`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AttendanceStore + 'static,
{
  let api = frekwencja_api::api_router(state.store)
    .layer(middleware::from_fn_with_state(state.auth, require_auth));

  Router::new()
    .route("/health", get(health))
    .nest(API_PREFIX, api)
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "ok": true })) }

//! `server`: the frekwencja HTTP server.
//!
//! Settings come from a TOML file (default `config.toml`, optional) with
//! `FREKWENCJA_*` environment variables layered on top:
//!
//! ```toml
//! host               = "0.0.0.0"
//! port               = 8080
//! store_path         = "~/.local/share/frekwencja/attendance.db"
//! auth_username      = "ala"
//! auth_password_hash = "$argon2id$v=19$..."
//! ```
//!
//! `server --hash-password` reads a password from stdin and prints the hash
//! to paste into `auth_password_hash`.

use std::{io::BufRead as _, path::Path, sync::Arc};

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use frekwencja_server::{API_PREFIX, AppState, ServerConfig, auth::hash_password};
use frekwencja_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Attendance tracker server")]
struct Cli {
  /// TOML configuration file; missing is fine when the environment covers it.
  #[arg(short, long, default_value = "config.toml")]
  config: std::path::PathBuf,

  /// Hash a password read from stdin, print it, and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  if cli.hash_password {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\n', '\r']);
    if password.is_empty() {
      bail!("refusing to hash an empty password");
    }
    println!("{}", hash_password(password)?);
    return Ok(());
  }

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cfg = load_config(&cli.config)?;
  let auth = cfg.auth_config().context("invalid auth settings")?;

  let store_file = cfg.store_file();
  if let Some(dir) = store_file.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("creating store directory {}", dir.display()))?;
  }
  let store = SqliteStore::open(&store_file)
    .await
    .with_context(|| format!("opening attendance store {}", store_file.display()))?;
  info!(path = %store_file.display(), "opened attendance store");

  let app = frekwencja_server::router(AppState {
    store: Arc::new(store),
    auth:  Arc::new(auth),
  });

  let address = cfg.bind_address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("binding {address}"))?;
  info!(%address, api = API_PREFIX, user = %cfg.auth_username, "serving");

  axum::serve(listener, app).await.context("server stopped")
}

/// The config file (when present) overlaid with `FREKWENCJA_*` variables.
fn load_config(path: &Path) -> Result<ServerConfig> {
  let from_file = path.is_file();
  let cfg = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("FREKWENCJA"))
    .build()
    .with_context(|| format!("reading {}", path.display()))?
    .try_deserialize::<ServerConfig>()
    .context("parsing server settings")?;

  if from_file {
    info!(file = %path.display(), "loaded settings");
  } else {
    info!(file = %path.display(), "no config file, using environment and defaults");
  }
  Ok(cfg)
}

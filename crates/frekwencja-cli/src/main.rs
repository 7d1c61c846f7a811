//! `frek`: local-first command-line client for the frekwencja server.
//!
//! # Usage
//!
//! ```
//! frek --url http://localhost:8080 --user ala --password secret pull
//! frek planner --today 2024-09-07
//! frek --offline fill-week 2024-09-02
//! ```

mod app;
mod cache;
mod client;
mod render;
mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use app::{App, SettingChange};
use cache::LocalCache;
use clap::{Parser, Subcommand, ValueEnum};
use client::{ApiClient, ApiConfig};
use frekwencja_core::settings::{Commitment, SubjectPriority};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "frek", about = "Attendance tracker and absence planner")]
struct Args {
  /// Path to a TOML config file (url, username, password, data_dir).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the frekwencja server. Without one, everything stays local.
  #[arg(long, env = "FREKWENCJA_URL", global = true)]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "FREKWENCJA_USER", global = true)]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "FREKWENCJA_PASSWORD", global = true, hide_env_values = true)]
  password: Option<String>,

  /// Directory holding the local cache (default: ~/.local/share/frekwencja).
  #[arg(long, env = "FREKWENCJA_DATA_DIR", global = true)]
  data_dir: Option<PathBuf>,

  /// Ignore the server for this invocation.
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Replace the local state with the server's.
  Pull,
  /// Upload the local state (last write wins).
  Push,
  /// Attendance ratios, overall and per subject.
  Summary {
    #[arg(long)]
    from:    Option<String>,
    #[arg(long)]
    to:      Option<String>,
    #[arg(long)]
    subject: Option<String>,
    /// Also report numbers for this target percentage.
    #[arg(long)]
    target:  Option<u8>,
  },
  /// Evaluate the upcoming school days.
  Planner {
    /// Evaluate as if today were this date (YYYY-MM-DD).
    #[arg(long)]
    today:   Option<String>,
    #[arg(long)]
    plan:    Option<String>,
    #[arg(short, long)]
    verbose: bool,
  },
  /// Declare in advance whether you will attend a day.
  Commit {
    date:   String,
    #[arg(value_enum)]
    choice: CommitChoice,
  },
  /// Adjust a subject's planner settings.
  Setting {
    subject:  String,
    #[arg(long, value_enum)]
    priority: Option<PriorityArg>,
    /// Lessons of buffer to keep after a skip (0..=10).
    #[arg(long)]
    margin:   Option<u32>,
    /// Target attendance in percent.
    #[arg(long)]
    target:   Option<u8>,
  },
  /// Add a day's lessons from a plan, all present.
  FillDay {
    date: String,
    #[arg(long)]
    plan: Option<String>,
  },
  /// Add Monday to Friday of the week containing `date`.
  FillWeek {
    date: String,
    #[arg(long)]
    plan: Option<String>,
  },
  /// Flip one entry's presence.
  Toggle { id: String },
  /// Set one entry on the server, guarded by its version.
  Mark {
    id:     String,
    #[arg(value_enum)]
    status: Status,
  },
  /// List plans, optionally selecting the default one.
  Plans {
    #[arg(long)]
    select: Option<String>,
  },
  /// Add a plan from a JSON file.
  ImportPlan { file: PathBuf },
  /// Wipe all local data.
  Reset {
    #[arg(long)]
    yes: bool,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CommitChoice {
  Attend,
  Absent,
  Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PriorityArg {
  Absolute,
  Preferred,
  Neutral,
  Tolerated,
}

impl From<PriorityArg> for SubjectPriority {
  fn from(p: PriorityArg) -> Self {
    match p {
      PriorityArg::Absolute => SubjectPriority::Absolute,
      PriorityArg::Preferred => SubjectPriority::Preferred,
      PriorityArg::Neutral => SubjectPriority::Neutral,
      PriorityArg::Tolerated => SubjectPriority::Tolerated,
    }
  }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Status {
  Present,
  Absent,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
  #[serde(default)]
  data_dir: Option<PathBuf>,
}

fn non_empty(s: &str) -> Option<String> { (!s.is_empty()).then(|| s.to_string()) }

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override the config file, which overrides defaults.
  let data_dir = args
    .data_dir
    .or(file_cfg.data_dir)
    .unwrap_or_else(|| PathBuf::from("~/.local/share/frekwencja"));
  let cache = LocalCache::open(&expand_tilde(&data_dir))?;

  let base_url = args.url.or_else(|| non_empty(&file_cfg.url));
  let client = match base_url {
    Some(base_url) if !args.offline => Some(ApiClient::new(ApiConfig {
      base_url,
      username: args
        .user
        .or_else(|| non_empty(&file_cfg.username))
        .unwrap_or_default(),
      password: args
        .password
        .or_else(|| non_empty(&file_cfg.password))
        .unwrap_or_default(),
    })?),
    _ => None,
  };

  let mut app = App::new(cache, client);
  let result = run(&mut app, args.command).await;

  // Flush queued pushes even when the command failed.
  if let Some(warning) = app.finish().await? {
    eprintln!("warning: {warning}");
  }
  println!("{}", result?.trim_end());
  Ok(())
}

async fn run(app: &mut App, command: Command) -> Result<String> {
  match command {
    Command::Pull => app.pull().await,
    Command::Push => app.push().await,
    Command::Summary { from, to, subject, target } => {
      app.summary(from.as_deref(), to.as_deref(), subject.as_deref(), target)
    }
    Command::Planner { today, plan, verbose } => {
      app.planner(today.as_deref(), plan.as_deref(), verbose)
    }
    Command::Commit { date, choice } => {
      let choice = match choice {
        CommitChoice::Attend => Some(Commitment::Attend),
        CommitChoice::Absent => Some(Commitment::Absent),
        CommitChoice::Clear => None,
      };
      app.commit(&date, choice)
    }
    Command::Setting { subject, priority, margin, target } => app.setting(&subject, SettingChange {
      priority:        priority.map(Into::into),
      required_margin: margin,
      target_percent:  target,
    }),
    Command::FillDay { date, plan } => app.fill_day(&date, plan.as_deref()),
    Command::FillWeek { date, plan } => app.fill_week(&date, plan.as_deref()),
    Command::Toggle { id } => app.toggle(&id),
    Command::Mark { id, status } => app.mark(&id, matches!(status, Status::Present)).await,
    Command::Plans { select } => app.plans(select.as_deref()),
    Command::ImportPlan { file } => {
      let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading plan file {}", file.display()))?;
      app.import_plan(&raw)
    }
    Command::Reset { yes } => {
      if !yes {
        anyhow::bail!("this deletes all local data; pass --yes to confirm");
      }
      app.reset()
    }
  }
}

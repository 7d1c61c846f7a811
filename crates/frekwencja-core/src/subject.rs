//! Subjects and the canonical subject key.
//!
//! Timetable exports label the same subject inconsistently ("Matematyka 1/2",
//! "matematyka - 2/2", "r_matematyka"). Every comparison between subjects in
//! this crate goes through [`normalize`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A subject the user tracks. `key` is unique within a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub key:   String,
  pub label: String,
}

impl Subject {
  pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
    Self { key: key.into(), label: label.into() }
  }
}

/// Group-size markers such as `1/2`, ` - 2/3` ending at a word boundary.
static GROUP_MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?:\s|-)*\d+/\d+\b").expect("static regex"));

static TRAILING_JUNK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[\s-]+$").expect("static regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\s{2,}").expect("static regex"));

/// The one known naming inconsistency in the source timetable data.
const ALIASES: &[(&str, &str)] = &[("r_matematyka", "matematyka")];

/// Canonicalise a subject label or raw key.
///
/// Pure, total and idempotent. Removing a marker can expose a new one
/// (`"1 2/3/4"`), so the single pass is repeated until it reaches a fixed
/// point; every pass that changes the string makes it strictly shorter.
pub fn normalize(raw: &str) -> String {
  let mut current = normalize_once(raw);
  loop {
    let next = normalize_once(&current);
    if next == current {
      return current;
    }
    current = next;
  }
}

/// The key a lesson is counted under: its normalized subject key, or its
/// label when the key is empty.
pub fn key_or_label(key: &str, label: &str) -> String {
  normalize(if key.trim().is_empty() { label } else { key })
}

fn normalize_once(raw: &str) -> String {
  let lowered = raw.to_lowercase();
  let stripped = GROUP_MARKER.replace_all(lowered.trim(), "");
  let stripped = TRAILING_JUNK.replace(&stripped, "");
  let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
  let key = collapsed.trim();

  ALIASES
    .iter()
    .find(|(from, _)| *from == key)
    .map_or_else(|| key.to_owned(), |(_, to)| (*to).to_owned())
}

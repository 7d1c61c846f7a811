//! SQL schema for the Frekwencja SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per user: everything except the ledger itself.
CREATE TABLE IF NOT EXISTS attendance_states (
    user_id       TEXT PRIMARY KEY,
    subjects_json TEXT NOT NULL DEFAULT '[]',
    plans_json    TEXT NOT NULL DEFAULT '[]',
    version       INTEGER NOT NULL DEFAULT 1,
    updated_at    TEXT NOT NULL          -- ISO 8601 UTC; server-assigned
);

-- The ledger. entry_id is '<date>#<slot>', unique per user.
CREATE TABLE IF NOT EXISTS attendance_entries (
    user_id       TEXT NOT NULL,
    entry_id      TEXT NOT NULL,
    date          TEXT NOT NULL,         -- YYYY-MM-DD
    day_name      TEXT NOT NULL,
    slot          TEXT NOT NULL,
    subject_key   TEXT NOT NULL,
    subject_label TEXT NOT NULL,
    present       INTEGER NOT NULL,
    version       INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (user_id, entry_id)
);

CREATE INDEX IF NOT EXISTS entries_user_date_idx ON attendance_entries(user_id, date);

PRAGMA user_version = 1;
";

//! [`SqliteStore`], the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use tracing::{debug, warn};

use frekwencja_core::{
  entry::AttendanceEntry,
  ledger::{EntryUpdate, Ledger},
  plan::Plan,
  state::AttendanceState,
  store::{AttendanceStore, EntryPage, EntryQuery},
};

use crate::{
  Error, Result,
  encode::{
    ENTRY_COLUMNS, EntryParams, RawEntry, RawState, decode_plans, encode_date, encode_dt,
    encode_plans, encode_subjects,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Attendance state for any number of users, backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `verb` is `INSERT`, `INSERT OR IGNORE` or `INSERT OR REPLACE`.
fn insert_entry(
  conn: &rusqlite::Connection,
  verb: &str,
  user_id: &str,
  row: &EntryParams,
) -> rusqlite::Result<usize> {
  conn.execute(
    &format!(
      "{verb} INTO attendance_entries (user_id, {ENTRY_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    ),
    rusqlite::params![
      user_id,
      row.entry_id,
      row.date,
      row.day_name,
      row.slot,
      row.subject_key,
      row.subject_label,
      row.present,
      row.version,
    ],
  )
}

fn decode_entries(raws: Vec<RawEntry>) -> Result<Vec<AttendanceEntry>> {
  raws.into_iter().map(RawEntry::into_entry).collect()
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Whole state ─────────────────────────────────────────────────────────

  async fn load_state(&self, user: &str) -> Result<AttendanceState> {
    let user_id = user.to_owned();

    let (raw_state, raw_entries): (Option<RawState>, Vec<RawEntry>) = self
      .conn
      .call(move |conn| {
        let state = conn
          .query_row(
            "SELECT subjects_json, plans_json, version, updated_at
             FROM attendance_states WHERE user_id = ?1",
            rusqlite::params![user_id],
            |row| {
              Ok(RawState {
                subjects_json: row.get(0)?,
                plans_json:    row.get(1)?,
                version:       row.get(2)?,
                updated_at:    row.get(3)?,
              })
            },
          )
          .optional()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTRY_COLUMNS} FROM attendance_entries WHERE user_id = ?1"
        ))?;
        let entries = stmt
          .query_map(rusqlite::params![user_id], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((state, entries))
      })
      .await?;

    let mut state = match raw_state {
      Some(raw) => {
        let decoded = raw.decode()?;
        AttendanceState {
          subjects:   decoded.subjects,
          plans:      decoded.plans,
          by_date:    Ledger::new(),
          version:    decoded.version,
          updated_at: decoded.updated_at,
        }
      }
      None => AttendanceState::default(),
    };
    state.by_date = Ledger::from_entries(decode_entries(raw_entries)?);
    Ok(state)
  }

  async fn save_state(&self, user: &str, mut state: AttendanceState) -> Result<AttendanceState> {
    let user_id       = user.to_owned();
    let subjects_json = encode_subjects(&state.subjects)?;
    let plans_json    = encode_plans(&state.plans)?;
    let updated_at    = Utc::now();
    let at_str        = encode_dt(updated_at);
    let rows: Vec<EntryParams> = state.by_date.entries().map(EntryParams::from).collect();
    let row_count = rows.len();

    let version: u32 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // A state that was never saved reads back as version 1.
        let current: Option<u32> = tx
          .query_row(
            "SELECT version FROM attendance_states WHERE user_id = ?1",
            rusqlite::params![user_id],
            |r| r.get(0),
          )
          .optional()?;
        let next = current.unwrap_or(1).saturating_add(1);

        tx.execute(
          "INSERT INTO attendance_states
             (user_id, subjects_json, plans_json, version, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (user_id) DO UPDATE SET
             subjects_json = excluded.subjects_json,
             plans_json    = excluded.plans_json,
             version       = excluded.version,
             updated_at    = excluded.updated_at",
          rusqlite::params![user_id, subjects_json, plans_json, next, at_str],
        )?;

        tx.execute(
          "DELETE FROM attendance_entries WHERE user_id = ?1",
          rusqlite::params![user_id],
        )?;
        for row in &rows {
          insert_entry(&tx, "INSERT OR REPLACE", &user_id, row)?;
        }

        tx.commit()?;
        Ok(next)
      })
      .await?;

    debug!(user, version, entries = row_count, "saved attendance state");
    state.version = version;
    state.updated_at = updated_at;
    Ok(state)
  }

  // ── Entries ─────────────────────────────────────────────────────────────

  async fn list_entries(&self, user: &str, query: &EntryQuery) -> Result<EntryPage> {
    let user_id = user.to_owned();
    let from    = query.filter.from.map(encode_date);
    let to      = query.filter.to.map(encode_date);
    let cursor  = query.cursor.clone();

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENTRY_COLUMNS} FROM attendance_entries
           WHERE user_id = ?1
             AND (?2 IS NULL OR date >= ?2)
             AND (?3 IS NULL OR date <= ?3)
             AND (?4 IS NULL OR entry_id > ?4)
           ORDER BY entry_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_id, from, to, cursor], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // The subject filter compares normalized keys, which SQL cannot do.
    let entries = decode_entries(raws)?;
    Ok(query.page(&entries))
  }

  async fn update_entries(&self, user: &str, updates: &[EntryUpdate]) -> Result<usize> {
    let user_id = user.to_owned();
    let updates = updates.to_vec();

    let outcome: Result<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut raws: Vec<RawEntry> = Vec::with_capacity(updates.len());
        for update in &updates {
          if raws.iter().any(|r| r.entry_id == update.id) {
            continue;
          }
          let raw = tx
            .query_row(
              &format!(
                "SELECT {ENTRY_COLUMNS} FROM attendance_entries
                 WHERE user_id = ?1 AND entry_id = ?2"
              ),
              rusqlite::params![user_id, update.id],
              RawEntry::from_row,
            )
            .optional()?;
          raws.extend(raw);
        }

        // Dropping the transaction on any early return rolls it back.
        let mut ledger = match decode_entries(raws) {
          Ok(entries) => Ledger::from_entries(entries),
          Err(e) => return Ok(Err(e)),
        };
        let updated = match ledger.apply_updates(&updates) {
          Ok(updated) => updated,
          Err(conflict) => return Ok(Err(conflict.into())),
        };

        for entry in ledger.entries() {
          tx.execute(
            "UPDATE attendance_entries SET present = ?3, version = ?4
             WHERE user_id = ?1 AND entry_id = ?2",
            rusqlite::params![user_id, entry.id, entry.present, entry.version],
          )?;
        }
        tx.commit()?;
        Ok(Ok(updated))
      })
      .await?;

    match outcome {
      Ok(updated) => {
        debug!(user, updated, "updated entries");
        Ok(updated)
      }
      Err(err) => {
        warn!(user, %err, "rejected entry update batch");
        Err(err)
      }
    }
  }

  async fn set_day_present(&self, user: &str, date: NaiveDate, present: bool) -> Result<usize> {
    let user_id  = user.to_owned();
    let date_str = encode_date(date);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE attendance_entries SET present = ?3, version = version + 1
           WHERE user_id = ?1 AND date = ?2 AND present != ?3",
          rusqlite::params![user_id, date_str, present],
        )?)
      })
      .await?;

    debug!(user, %date, present, changed, "set day presence");
    Ok(changed)
  }

  async fn replace_day(
    &self,
    user: &str,
    date: NaiveDate,
    entries: Vec<AttendanceEntry>,
  ) -> Result<usize> {
    let user_id  = user.to_owned();
    let date_str = encode_date(date);
    let at_str   = encode_dt(Utc::now());
    let entries: Vec<AttendanceEntry> = entries.into_iter().filter(|e| e.date == date).collect();

    let outcome: Result<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raws = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM attendance_entries WHERE user_id = ?1 AND date = ?2"
          ))?;
          stmt
            .query_map(rusqlite::params![user_id, date_str], RawEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        let mut ledger = match decode_entries(raws) {
          Ok(existing) => Ledger::from_entries(existing),
          Err(e) => return Ok(Err(e)),
        };
        let removed = ledger.replace_day(date, entries).len();

        tx.execute(
          "DELETE FROM attendance_entries WHERE user_id = ?1 AND date = ?2",
          rusqlite::params![user_id, date_str],
        )?;
        for entry in ledger.day(date) {
          insert_entry(&tx, "INSERT OR REPLACE", &user_id, &EntryParams::from(entry))?;
        }
        // Overwrites count as a write to the whole state.
        tx.execute(
          "UPDATE attendance_states SET version = version + 1, updated_at = ?2
           WHERE user_id = ?1",
          rusqlite::params![user_id, at_str],
        )?;

        tx.commit()?;
        Ok(Ok(removed))
      })
      .await?;

    let removed = outcome?;
    debug!(user, %date, removed, "replaced day");
    Ok(removed)
  }

  async fn add_entries(&self, user: &str, entries: Vec<AttendanceEntry>) -> Result<usize> {
    let user_id = user.to_owned();
    let rows: Vec<EntryParams> = entries.iter().map(EntryParams::from).collect();

    let added = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut added = 0;
        for row in &rows {
          added += insert_entry(&tx, "INSERT OR IGNORE", &user_id, row)?;
        }
        tx.commit()?;
        Ok(added)
      })
      .await?;

    debug!(user, added, "added entries");
    Ok(added)
  }

  // ── Plans ───────────────────────────────────────────────────────────────

  async fn list_plans(&self, user: &str) -> Result<Vec<Plan>> {
    let user_id = user.to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT plans_json FROM attendance_states WHERE user_id = ?1",
            rusqlite::params![user_id],
            |r| r.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.as_deref().map(decode_plans).transpose().map(Option::unwrap_or_default)
  }
}

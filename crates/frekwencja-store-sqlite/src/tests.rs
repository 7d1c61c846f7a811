//! Integration tests for `SqliteStore` against an in-memory database.

use frekwencja_core::{
  aggregate::EntryFilter,
  calendar::{DayName, parse_date},
  ledger::EntryUpdate,
  plan::{Plan, PlanDay, PlanItem},
  state::AttendanceState,
  store::{AttendanceStore, EntryQuery, StoreError as _},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn plan() -> Plan {
  let mut plan = Plan::new("2A");
  // Plans travel with millisecond timestamps.
  plan.created_at = chrono::DateTime::from_timestamp_millis(1_725_000_000_000).unwrap();
  for day in DayName::SCHOOL_DAYS {
    let items = ["Matematyka", "Fizyka 1/2", "WF"]
      .into_iter()
      .map(|label| PlanItem {
        slot_hint:     None,
        subject_key:   frekwencja_core::subject::normalize(label),
        subject_label: label.into(),
      })
      .collect();
    plan.days.insert(day, PlanDay { items });
  }
  plan
}

/// A saved state with one plan and the week of 2024-09-02 filled in.
async fn seeded(s: &SqliteStore, user: &str) -> AttendanceState {
  let mut state = AttendanceState::default();
  let plan = plan();
  let plan_id = plan.id.clone();
  state.upsert_plan(plan);
  state
    .fill_week_from_plan(&plan_id, parse_date("2024-09-02").unwrap())
    .unwrap();
  s.save_state(user, state).await.unwrap()
}

// ─── Whole state ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_user_gets_the_default_state() {
  let s = store().await;
  let state = s.load_state("nobody").await.unwrap();
  assert_eq!(state.subjects.len(), 3);
  assert!(state.plans.is_empty());
  assert!(state.by_date.is_empty());
  assert_eq!(state.version, 1);
  assert!(s.list_plans("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn save_then_load_roundtrips_and_bumps_the_version() {
  let s = store().await;
  let saved = seeded(&s, "ala").await;
  assert_eq!(saved.version, 2);
  assert_eq!(saved.by_date.len(), 15);

  let loaded = s.load_state("ala").await.unwrap();
  assert_eq!(loaded.version, 2);
  assert_eq!(loaded.by_date, saved.by_date);
  assert_eq!(loaded.plans, saved.plans);
  assert!(loaded.subjects.iter().any(|sub| sub.key == "fizyka"));

  let again = s.save_state("ala", loaded).await.unwrap();
  assert_eq!(again.version, 3);
}

#[tokio::test]
async fn users_are_isolated() {
  let s = store().await;
  seeded(&s, "ala").await;
  let other = s.load_state("ola").await.unwrap();
  assert!(other.by_date.is_empty());
  assert_eq!(s.list_plans("ala").await.unwrap().len(), 1);
  assert!(s.list_plans("ola").await.unwrap().is_empty());
}

// ─── Entries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_entries_pages_by_id_and_filters() {
  let s = store().await;
  seeded(&s, "ala").await;

  let mut query = EntryQuery { limit: Some(4), ..EntryQuery::default() };
  let mut ids = Vec::new();
  loop {
    let page = s.list_entries("ala", &query).await.unwrap();
    assert!(page.entries.len() <= 4);
    ids.extend(page.entries.into_iter().map(|e| e.id));
    match page.next_cursor {
      Some(c) => query.cursor = Some(c),
      None => break,
    }
  }
  assert_eq!(ids.len(), 15);
  assert!(ids.windows(2).all(|w| w[0] < w[1]));

  let fizyka_on_tuesday = EntryQuery {
    filter: EntryFilter {
      from:        Some(parse_date("2024-09-03").unwrap()),
      to:          Some(parse_date("2024-09-03").unwrap()),
      subject_key: Some("Fizyka 2/2".into()),
    },
    ..EntryQuery::default()
  };
  let page = s.list_entries("ala", &fizyka_on_tuesday).await.unwrap();
  assert_eq!(page.entries.len(), 1);
  assert_eq!(page.entries[0].id, "2024-09-03#Wtorek#2");
  assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn stale_batch_changes_nothing() {
  let s = store().await;
  seeded(&s, "ala").await;
  let a = "2024-09-02#Poniedziałek#1".to_owned();
  let b = "2024-09-02#Poniedziałek#2".to_owned();

  let err = s
    .update_entries("ala", &[
      EntryUpdate { id: a.clone(), present: false, expected_version: Some(1) },
      EntryUpdate { id: b.clone(), present: false, expected_version: Some(5) },
    ])
    .await
    .unwrap_err();
  assert!(matches!(
    err.as_core(),
    Some(frekwencja_core::Error::VersionConflict { actual: 1, .. })
  ));

  let state = s.load_state("ala").await.unwrap();
  assert!(state.by_date.find(&a).unwrap().present);
  assert_eq!(state.by_date.find(&a).unwrap().version, 1);

  let updated = s
    .update_entries("ala", &[
      EntryUpdate { id: a.clone(), present: false, expected_version: Some(1) },
      EntryUpdate { id: "2024-09-02#Poniedziałek#9".into(), present: false, expected_version: None },
    ])
    .await
    .unwrap();
  assert_eq!(updated, 1);
  let entry = s.load_state("ala").await.unwrap().by_date.find(&a).cloned().unwrap();
  assert!(!entry.present);
  assert_eq!(entry.version, 2);

  // The same id twice in one batch is two mutations.
  let updated = s
    .update_entries("ala", &[
      EntryUpdate { id: b.clone(), present: false, expected_version: Some(1) },
      EntryUpdate { id: b.clone(), present: true, expected_version: None },
    ])
    .await
    .unwrap();
  assert_eq!(updated, 2);
  let entry = s.load_state("ala").await.unwrap().by_date.find(&b).cloned().unwrap();
  assert!(entry.present);
  assert_eq!(entry.version, 3);
}

#[tokio::test]
async fn set_day_present_only_touches_changed_rows() {
  let s = store().await;
  seeded(&s, "ala").await;
  let wednesday = parse_date("2024-09-04").unwrap();

  assert_eq!(s.set_day_present("ala", wednesday, true).await.unwrap(), 0);
  assert_eq!(s.set_day_present("ala", wednesday, false).await.unwrap(), 3);
  let state = s.load_state("ala").await.unwrap();
  assert!(state.by_date.day(wednesday).iter().all(|e| !e.present && e.version == 2));
  // Other days untouched.
  assert!(state.by_date.day(parse_date("2024-09-05").unwrap()).iter().all(|e| e.present));
}

#[tokio::test]
async fn replace_and_add_entries() {
  let s = store().await;
  let state = seeded(&s, "ala").await;
  let friday = parse_date("2024-09-06").unwrap();
  let monday = parse_date("2024-09-09").unwrap();
  let plan = &state.plans[0];

  let removed = s
    .replace_day("ala", friday, plan.materialize_day(friday, false))
    .await
    .unwrap();
  assert_eq!(removed, 3);
  let loaded = s.load_state("ala").await.unwrap();
  assert!(loaded.by_date.day(friday).iter().all(|e| !e.present));

  // Insert-or-ignore: existing ids stay as they are.
  let mut rows = plan.materialize_day(friday, true);
  rows.extend(plan.materialize_day(monday, true));
  assert_eq!(s.add_entries("ala", rows).await.unwrap(), 3);
  let loaded = s.load_state("ala").await.unwrap();
  assert!(loaded.by_date.day(friday).iter().all(|e| !e.present));
  assert_eq!(loaded.by_date.day(monday).len(), 3);
}

#[tokio::test]
async fn overwriting_a_day_keeps_versions_moving_forward() {
  let s = store().await;
  let state = seeded(&s, "ala").await;
  let monday = parse_date("2024-09-02").unwrap();
  let a = "2024-09-02#Poniedziałek#1".to_owned();

  for (present, seen) in [(false, 1), (true, 2)] {
    s.update_entries("ala", &[EntryUpdate { id: a.clone(), present, expected_version: Some(seen) }])
      .await
      .unwrap();
  }

  let removed = s
    .replace_day("ala", monday, state.plans[0].materialize_day(monday, true))
    .await
    .unwrap();
  assert_eq!(removed, 3);

  let loaded = s.load_state("ala").await.unwrap();
  assert_eq!(loaded.by_date.find(&a).unwrap().version, 4);
  assert!(loaded.by_date.day(monday).iter().skip(1).all(|e| e.version == 2));
  assert_eq!(loaded.version, state.version + 1);
  assert!(loaded.updated_at >= state.updated_at);

  let err = s
    .update_entries("ala", &[EntryUpdate { id: a.clone(), present: false, expected_version: Some(1) }])
    .await
    .unwrap_err();
  assert!(matches!(
    err.as_core(),
    Some(frekwencja_core::Error::VersionConflict { expected: 1, actual: 4, .. })
  ));
}

#[tokio::test]
async fn schema_init_is_idempotent() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("store.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    seeded(&s, "ala").await;
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.load_state("ala").await.unwrap().by_date.len(), 15);
}

#[test]
fn only_core_errors_expose_a_core_error() {
  let err = Error::DateParse("x".into());
  assert!(err.as_core().is_none());
  let err = Error::from(frekwencja_core::Error::PlanNotFound("p".into()));
  assert!(err.as_core().is_some());
}

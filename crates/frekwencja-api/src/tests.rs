//! Router tests against an in-memory `SqliteStore`.

use std::sync::Arc;

use axum::{
  Extension, Router,
  body::Body,
  http::{HeaderMap, Method, Request, StatusCode, header},
};
use frekwencja_core::{
  calendar::DayName,
  plan::{Plan, PlanDay, PlanItem},
  state::AttendanceState,
};
use frekwencja_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{CurrentUser, api_router};

async fn store() -> Arc<SqliteStore> {
  Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  )
}

fn as_user(store: Arc<SqliteStore>, user: &str) -> Router {
  api_router(store).layer(Extension(CurrentUser(user.to_owned())))
}

fn plan(name: &str) -> Plan {
  let mut plan = Plan::new(name);
  for day in DayName::SCHOOL_DAYS {
    let items = ["matematyka", "fizyka", "wf"]
      .into_iter()
      .map(|key| PlanItem {
        slot_hint:     None,
        subject_key:   key.into(),
        subject_label: key.to_uppercase(),
      })
      .collect();
    plan.days.insert(day, PlanDay { items });
  }
  plan
}

struct Reply {
  status:  StatusCode,
  headers: HeaderMap,
  body:    Value,
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
  send_with(app, method, uri, body, None).await
}

async fn send_with(
  app: &Router,
  method: Method,
  uri: &str,
  body: Option<Value>,
  if_match: Option<&str>,
) -> Reply {
  let mut builder = Request::builder().method(method).uri(uri);
  if body.is_some() {
    builder = builder.header(header::CONTENT_TYPE, "application/json");
  }
  if let Some(tag) = if_match {
    builder = builder.header(header::IF_MATCH, tag);
  }
  let req = builder
    .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
    .unwrap();

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let headers = resp.headers().clone();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  Reply { status, headers, body }
}

/// Store a state holding one plan; returns the plan id.
async fn seed(app: &Router) -> String {
  let mut state = AttendanceState::default();
  let plan = plan("2A");
  let id = plan.id.clone();
  state.upsert_plan(plan);
  let r = send(app, Method::PUT, "/attendance", Some(serde_json::to_value(&state).unwrap())).await;
  assert_eq!(r.status, StatusCode::OK);
  id
}

// ─── Whole state ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_user_gets_the_default_state() {
  let app = as_user(store().await, "ala");
  let r = send(&app, Method::GET, "/attendance", None).await;
  assert_eq!(r.status, StatusCode::OK);
  assert_eq!(r.body["subjects"].as_array().unwrap().len(), 3);
  assert_eq!(r.body["version"], 1);
  assert!(r.headers.contains_key(header::ETAG));
}

#[tokio::test]
async fn requests_without_a_user_are_rejected() {
  let app = api_router(store().await);
  let r = send(&app, Method::GET, "/attendance", None).await;
  assert_eq!(r.status, StatusCode::UNAUTHORIZED);
  assert_eq!(r.body["error"], "unauthorized");
}

#[tokio::test]
async fn put_honours_if_match() {
  let app = as_user(store().await, "ala");
  seed(&app).await;

  let current = send(&app, Method::GET, "/attendance", None).await;
  let etag = current.headers[header::ETAG].to_str().unwrap().to_owned();

  let stale = send_with(
    &app,
    Method::PUT,
    "/attendance",
    Some(current.body.clone()),
    Some("\"not-the-tag\""),
  )
  .await;
  assert_eq!(stale.status, StatusCode::PRECONDITION_FAILED);

  let ok = send_with(&app, Method::PUT, "/attendance", Some(current.body), Some(&etag)).await;
  assert_eq!(ok.status, StatusCode::OK);
  assert_eq!(ok.body["version"], 3);
  assert_ne!(ok.headers[header::ETAG].to_str().unwrap(), etag);
}

#[tokio::test]
async fn users_do_not_see_each_other() {
  let store = store().await;
  seed(&as_user(store.clone(), "ala")).await;
  let r = send(&as_user(store, "ola"), Method::GET, "/attendance/plans", None).await;
  assert_eq!(r.body, json!([]));
}

// ─── Day operations ──────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_plan_requires_overwrite_for_a_logged_day() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;
  let uri = "/attendance/days/2024-09-02/apply-plan";

  let r = send(&app, Method::POST, uri, Some(json!({ "planId": plan_id }))).await;
  assert_eq!(r.status, StatusCode::OK);
  assert_eq!(r.body, json!({ "created": 3, "overwritten": 0 }));

  let r = send(&app, Method::POST, uri, Some(json!({ "planId": plan_id }))).await;
  assert_eq!(r.status, StatusCode::CONFLICT);

  let r = send(
    &app,
    Method::POST,
    uri,
    Some(json!({ "planId": plan_id, "overwrite": true, "setPresent": false })),
  )
  .await;
  assert_eq!(r.body, json!({ "created": 3, "overwritten": 3 }));

  let summary = send(&app, Method::GET, "/attendance/summary", None).await;
  assert_eq!(summary.body["present"], 0);
  assert_eq!(summary.body["total"], 3);
}

#[tokio::test]
async fn overwrite_invalidates_earlier_tags() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;
  let uri = "/attendance/days/2024-09-02/apply-plan";
  let id = "2024-09-02#Poniedziałek#1";

  send(&app, Method::POST, uri, Some(json!({ "planId": plan_id }))).await;
  let before = send(&app, Method::GET, "/attendance", None).await;
  let etag = before.headers[header::ETAG].to_str().unwrap().to_owned();

  let r = send(
    &app,
    Method::POST,
    uri,
    Some(json!({ "planId": plan_id, "overwrite": true })),
  )
  .await;
  assert_eq!(r.status, StatusCode::OK);

  let r = send(
    &app,
    Method::PATCH,
    "/attendance/entries",
    Some(json!({ "updates": [{ "id": id, "present": false, "ifMatch": "\"v1\"" }] })),
  )
  .await;
  assert_eq!(r.status, StatusCode::CONFLICT);

  let r = send_with(&app, Method::PUT, "/attendance", Some(before.body), Some(&etag)).await;
  assert_eq!(r.status, StatusCode::PRECONDITION_FAILED);

  let r = send(&app, Method::GET, "/attendance/entries?from=2024-09-02&to=2024-09-02", None).await;
  let entries = r.body["entries"].as_array().unwrap();
  assert_eq!(entries.len(), 3);
  assert!(entries.iter().all(|e| e["version"] == 2));
}

#[tokio::test]
async fn apply_plan_rejects_bad_input() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;

  // Saturday: the plan has no lessons.
  let r = send(
    &app,
    Method::POST,
    "/attendance/days/2024-09-07/apply-plan",
    Some(json!({ "planId": plan_id })),
  )
  .await;
  assert_eq!(r.status, StatusCode::BAD_REQUEST);

  let r = send(
    &app,
    Method::POST,
    "/attendance/days/2024-09-02/apply-plan",
    Some(json!({ "planId": "missing" })),
  )
  .await;
  assert_eq!(r.status, StatusCode::NOT_FOUND);

  let r = send(
    &app,
    Method::POST,
    "/attendance/days/02-09-2024/present",
    Some(json!({ "present": true })),
  )
  .await;
  assert_eq!(r.status, StatusCode::BAD_REQUEST);
  assert!(r.body["error"].as_str().unwrap().contains("02-09-2024"));
}

#[tokio::test]
async fn week_fill_is_idempotent_and_snaps_to_monday() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;

  let r = send(
    &app,
    Method::POST,
    "/attendance/weeks/2024-09-04/fill",
    Some(json!({ "planId": plan_id })),
  )
  .await;
  assert_eq!(r.body, json!({ "created": 15 }));

  let r = send(
    &app,
    Method::POST,
    "/attendance/weeks/2024-09-02/fill",
    Some(json!({ "planId": plan_id })),
  )
  .await;
  assert_eq!(r.body, json!({ "created": 0 }));
}

// ─── Entries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn entries_page_and_patch_with_versions() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;
  send(
    &app,
    Method::POST,
    "/attendance/weeks/2024-09-02/fill",
    Some(json!({ "planId": plan_id })),
  )
  .await;

  let first = send(&app, Method::GET, "/attendance/entries?limit=10", None).await;
  assert_eq!(first.body["entries"].as_array().unwrap().len(), 10);
  let cursor = first.body["nextCursor"].as_str().unwrap().to_owned();
  let rest = send(
    &app,
    Method::GET,
    &format!("/attendance/entries?limit=10&cursor={}", urlencode(&cursor)),
    None,
  )
  .await;
  assert_eq!(rest.body["entries"].as_array().unwrap().len(), 5);
  assert_eq!(rest.body["nextCursor"], Value::Null);

  let id = first.body["entries"][0]["id"].as_str().unwrap().to_owned();
  let patch = json!({ "updates": [{ "id": id, "present": false, "ifMatch": "\"v1\"" }] });
  let r = send(&app, Method::PATCH, "/attendance/entries", Some(patch.clone())).await;
  assert_eq!(r.body, json!({ "updated": 1 }));

  let r = send(&app, Method::PATCH, "/attendance/entries", Some(patch)).await;
  assert_eq!(r.status, StatusCode::CONFLICT);
  assert!(r.body["error"].as_str().unwrap().contains("version conflict"));

  let r = send(
    &app,
    Method::PATCH,
    "/attendance/entries",
    Some(json!({ "updates": [{ "id": id, "present": true, "ifMatch": "vX" }] })),
  )
  .await;
  assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entries_filter_by_date_and_subject() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;
  send(
    &app,
    Method::POST,
    "/attendance/weeks/2024-09-02/fill",
    Some(json!({ "planId": plan_id })),
  )
  .await;

  let r = send(
    &app,
    Method::GET,
    "/attendance/entries?from=2024-09-03&to=2024-09-04&subjectKey=Fizyka%201%2F2",
    None,
  )
  .await;
  let ids: Vec<&str> = r.body["entries"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["id"].as_str().unwrap())
    .collect();
  assert_eq!(ids, ["2024-09-03#Wtorek#2", "2024-09-04#Środa#2"]);

  let r = send(&app, Method::GET, "/attendance/entries?from=yesterday", None).await;
  assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

// ─── Summary ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn summary_reports_fifty_percent_and_target_numbers() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;
  send(
    &app,
    Method::POST,
    "/attendance/weeks/2024-09-02/fill",
    Some(json!({ "planId": plan_id })),
  )
  .await;
  let r = send(
    &app,
    Method::POST,
    "/attendance/days/2024-09-02/present",
    Some(json!({ "present": false })),
  )
  .await;
  assert_eq!(r.body, json!({ "updated": 3 }));

  // 12 of 15.
  let r = send(&app, Method::GET, "/attendance/summary?target=75", None).await;
  assert_eq!(r.status, StatusCode::OK);
  assert_eq!(r.body["present"], 12);
  assert_eq!(r.body["total"], 15);
  assert_eq!(r.body["percent"], 80.0);
  assert_eq!(r.body["needToReach50"], 0);
  assert_eq!(r.body["canSkipAndKeep50"], 9);
  assert_eq!(r.body["targetPercent"], 75);
  assert_eq!(r.body["needToReachTarget"], 0);
  assert_eq!(r.body["marginAboveTarget"], 1);

  // Monday only: 0 of 3.
  let r = send(
    &app,
    Method::GET,
    "/attendance/summary?from=2024-09-02&to=2024-09-02",
    None,
  )
  .await;
  assert_eq!(r.body["percent"], 0.0);
  assert_eq!(r.body["needToReach50"], 3);
  assert!(r.body.get("targetPercent").is_none());

  let r = send(&app, Method::GET, "/attendance/summary?target=101", None).await;
  assert_eq!(r.status, StatusCode::BAD_REQUEST);
}

// ─── Plans & planner ─────────────────────────────────────────────────────────

#[tokio::test]
async fn plans_are_listed_with_display_names() {
  let app = as_user(store().await, "ala");
  let mut state = AttendanceState::default();
  let mut older = plan("2A");
  older.created_at = chrono::DateTime::from_timestamp_millis(1_000).unwrap();
  let mut newer = plan("2A");
  newer.created_at = chrono::DateTime::from_timestamp_millis(2_000).unwrap();
  let (older_id, newer_id) = (older.id.clone(), newer.id.clone());
  state.upsert_plan(older);
  state.upsert_plan(newer);
  send(&app, Method::PUT, "/attendance", Some(serde_json::to_value(&state).unwrap())).await;

  let r = send(&app, Method::GET, "/attendance/plans", None).await;
  let listed = r.body.as_array().unwrap();
  assert_eq!(listed.len(), 2);
  let name_of = |id: &str| {
    listed
      .iter()
      .find(|p| p["id"] == id)
      .map(|p| p["displayName"].as_str().unwrap().to_owned())
      .unwrap()
  };
  assert_eq!(name_of(&older_id), "2A");
  assert_eq!(name_of(&newer_id), "2A (1)");
}

#[tokio::test]
async fn planner_evaluates_next_week_on_a_saturday() {
  let app = as_user(store().await, "ala");
  let plan_id = seed(&app).await;

  let r = send(
    &app,
    Method::POST,
    "/attendance/planner",
    Some(json!({
      "planId": plan_id,
      "today": "2024-09-07",
      "commitments": { "2024-09-10": "attend" },
      "settings": { "fizyka": { "priority": "ABSOLUTE" } }
    })),
  )
  .await;
  assert_eq!(r.status, StatusCode::OK);
  let days = r.body["days"].as_array().unwrap();
  let dates: Vec<&str> = days.iter().map(|d| d["date"].as_str().unwrap()).collect();
  assert_eq!(dates, [
    "2024-09-09",
    "2024-09-10",
    "2024-09-11",
    "2024-09-12",
    "2024-09-13"
  ]);
  assert_eq!(days[0]["tier"], "priority");
  assert_eq!(days[1]["tier"], "locked");
  assert_eq!(days[0]["absoluteSubjects"], json!(["FIZYKA"]));

  let r = send(
    &app,
    Method::POST,
    "/attendance/planner",
    Some(json!({ "today": "2024-09-07" })),
  )
  .await;
  let days = r.body["days"].as_array().unwrap();
  assert!(days.iter().all(|d| d["tier"] == "disabled"));

  let r = send(
    &app,
    Method::POST,
    "/attendance/planner",
    Some(json!({ "planId": "missing", "today": "2024-09-07" })),
  )
  .await;
  assert_eq!(r.status, StatusCode::NOT_FOUND);
}

fn urlencode(s: &str) -> String {
  s.bytes()
    .map(|b| match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
        (b as char).to_string()
      }
      _ => format!("%{b:02X}"),
    })
    .collect()
}

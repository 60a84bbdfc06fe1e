//! Integration tests for the SQLite execution store.

use chrono::{Duration, Utc};
use loom_store::{Error, ExecutionRecord, ExecutionStatus, ExecutionStore, SqliteStore};
use serde_json::json;
use sqlx::types::Json;

fn completed_record(execution_id: &str, started_at: chrono::DateTime<Utc>) -> ExecutionRecord {
  ExecutionRecord {
    execution_id: execution_id.to_string(),
    workflow_id: "wf".to_string(),
    status: ExecutionStatus::Completed,
    started_at,
    ended_at: Some(started_at + Duration::milliseconds(25)),
    node_results: Json(json!({ "a": { "executionTimeMs": 3, "success": true } })),
    metrics: Some(Json(json!({ "successRate": 1.0 }))),
    error: None,
  }
}

#[tokio::test]
async fn test_create_and_get_execution() {
  let store = SqliteStore::in_memory().await.expect("failed to open store");
  let record = completed_record("run-1", Utc::now());

  store
    .create_workflow_execution("wf", &record)
    .await
    .expect("insert failed");

  let fetched = store.get_execution("run-1").await.expect("get failed");
  assert_eq!(fetched.workflow_id, "wf");
  assert_eq!(fetched.status, ExecutionStatus::Completed);
  assert_eq!(fetched.node_results.0["a"]["success"], true);
  assert_eq!(fetched.metrics.unwrap().0["successRate"], 1.0);
}

#[tokio::test]
async fn test_missing_execution_is_not_found() {
  let store = SqliteStore::in_memory().await.expect("failed to open store");
  let result = store.get_execution("nope").await;
  assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_create_twice_replaces_record() {
  let store = SqliteStore::in_memory().await.expect("failed to open store");
  let mut record = completed_record("run-1", Utc::now());
  store.create_workflow_execution("wf", &record).await.unwrap();

  record.status = ExecutionStatus::Failed;
  record.error = Some("boom".to_string());
  store.create_workflow_execution("wf", &record).await.unwrap();

  let fetched = store.get_execution("run-1").await.unwrap();
  assert_eq!(fetched.status, ExecutionStatus::Failed);
  assert_eq!(fetched.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_abort_without_prior_record() {
  let store = SqliteStore::in_memory().await.expect("failed to open store");
  store
    .abort_workflow_execution("wf", "run-9")
    .await
    .expect("abort failed");

  let fetched = store.get_execution("run-9").await.unwrap();
  assert_eq!(fetched.status, ExecutionStatus::Aborted);
  assert!(fetched.ended_at.is_some());
}

#[tokio::test]
async fn test_list_executions_newest_first() {
  let store = SqliteStore::in_memory().await.expect("failed to open store");
  let now = Utc::now();
  store
    .create_workflow_execution("wf", &completed_record("old", now - Duration::seconds(30)))
    .await
    .unwrap();
  store
    .create_workflow_execution("wf", &completed_record("new", now))
    .await
    .unwrap();

  let listed = store.list_executions("wf").await.unwrap();
  let ids: Vec<&str> = listed.iter().map(|r| r.execution_id.as_str()).collect();
  assert_eq!(ids, vec!["new", "old"]);
  assert!(store.list_executions("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_open_on_disk() {
  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let path = dir.path().join("loom.db");

  {
    let store = SqliteStore::open(&path).await.expect("failed to open store");
    store
      .create_workflow_execution("wf", &completed_record("run-1", Utc::now()))
      .await
      .unwrap();
  }

  let reopened = SqliteStore::open(&path).await.expect("failed to reopen store");
  assert!(reopened.get_execution("run-1").await.is_ok());
}

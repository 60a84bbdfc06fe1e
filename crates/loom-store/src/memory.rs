use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{Error, ExecutionRecord, ExecutionStatus, ExecutionStore};

/// In-process store backed by a map keyed by execution id.
#[derive(Debug, Default)]
pub struct MemoryStore {
  records: RwLock<HashMap<String, ExecutionRecord>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored records.
  pub fn len(&self) -> usize {
    self.records.read().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
  async fn create_workflow_execution(
    &self,
    workflow_id: &str,
    record: &ExecutionRecord,
  ) -> Result<(), Error> {
    let mut record = record.clone();
    record.workflow_id = workflow_id.to_string();
    let mut records = self.records.write().unwrap();
    records.insert(record.execution_id.clone(), record);
    Ok(())
  }

  async fn abort_workflow_execution(
    &self,
    workflow_id: &str,
    execution_id: &str,
  ) -> Result<(), Error> {
    let now = chrono::Utc::now();
    let mut records = self.records.write().unwrap();
    records
      .entry(execution_id.to_string())
      .and_modify(|record| {
        record.status = ExecutionStatus::Aborted;
        record.ended_at = Some(now);
      })
      .or_insert_with(|| ExecutionRecord::aborted(workflow_id, execution_id, now));
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    let records = self.records.read().unwrap();
    records
      .get(execution_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Error> {
    let records = self.records.read().unwrap();
    let mut matching: Vec<ExecutionRecord> = records
      .values()
      .filter(|record| record.workflow_id == workflow_id)
      .cloned()
      .collect();
    matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(matching)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, Utc};
  use serde_json::json;
  use sqlx::types::Json;

  fn record(execution_id: &str, started_at: chrono::DateTime<Utc>) -> ExecutionRecord {
    ExecutionRecord {
      execution_id: execution_id.to_string(),
      workflow_id: "wf".to_string(),
      status: ExecutionStatus::Completed,
      started_at,
      ended_at: Some(started_at),
      node_results: Json(json!({ "a": { "success": true } })),
      metrics: None,
      error: None,
    }
  }

  #[tokio::test]
  async fn test_create_and_get() {
    let store = MemoryStore::new();
    store
      .create_workflow_execution("wf", &record("run-1", Utc::now()))
      .await
      .unwrap();

    let fetched = store.get_execution("run-1").await.unwrap();
    assert_eq!(fetched.status, ExecutionStatus::Completed);
    assert_eq!(fetched.node_results.0["a"]["success"], true);
    assert!(matches!(
      store.get_execution("run-2").await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_abort_creates_or_updates() {
    let store = MemoryStore::new();
    store.abort_workflow_execution("wf", "run-1").await.unwrap();
    assert_eq!(
      store.get_execution("run-1").await.unwrap().status,
      ExecutionStatus::Aborted
    );

    store
      .create_workflow_execution("wf", &record("run-2", Utc::now()))
      .await
      .unwrap();
    store.abort_workflow_execution("wf", "run-2").await.unwrap();
    assert_eq!(
      store.get_execution("run-2").await.unwrap().status,
      ExecutionStatus::Aborted
    );
    assert_eq!(store.len(), 2);
  }

  #[tokio::test]
  async fn test_list_newest_first() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store
      .create_workflow_execution("wf", &record("old", now - Duration::seconds(10)))
      .await
      .unwrap();
    store
      .create_workflow_execution("wf", &record("new", now))
      .await
      .unwrap();
    store
      .create_workflow_execution("other", &record("elsewhere", now))
      .await
      .unwrap();

    let listed = store.list_executions("wf").await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.execution_id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
  }
}

//! In-memory run history with change notifications.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use loom_store::{ExecutionRecord, ExecutionStatus, Json};
use serde::{Deserialize, Serialize};

use crate::events::EventBus;
use crate::result::{Metrics, NodeResult};

/// One entry of the engine's run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRun {
  pub id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub start_time: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_time: Option<DateTime<Utc>>,
  #[serde(default)]
  pub node_results: BTreeMap<String, NodeResult>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metrics: Option<Metrics>,
}

impl ExecutionRun {
  pub fn new(id: &str, workflow_id: &str) -> Self {
    Self {
      id: id.to_string(),
      workflow_id: workflow_id.to_string(),
      status: ExecutionStatus::Pending,
      start_time: Utc::now(),
      end_time: None,
      node_results: BTreeMap::new(),
      error: None,
      metrics: None,
    }
  }

  /// Move to `next` if that is a forward transition. Terminal statuses
  /// stamp `end_time`.
  pub fn transition(&mut self, next: ExecutionStatus) -> bool {
    if !self.status.can_transition_to(next) {
      return false;
    }
    self.status = next;
    if next.is_terminal() {
      self.end_time = Some(Utc::now());
    }
    true
  }

  /// The persisted form of this run.
  pub fn to_record(&self) -> ExecutionRecord {
    let node_results = self
      .node_results
      .iter()
      .map(|(id, result)| (id.clone(), result.to_value()))
      .collect::<serde_json::Map<_, _>>();

    ExecutionRecord {
      execution_id: self.id.clone(),
      workflow_id: self.workflow_id.clone(),
      status: self.status,
      started_at: self.start_time,
      ended_at: self.end_time,
      node_results: Json(serde_json::Value::Object(node_results)),
      metrics: self
        .metrics
        .as_ref()
        .and_then(|m| serde_json::to_value(m).ok())
        .map(Json),
      error: self.error.clone(),
    }
  }
}

/// Ordered run history, oldest first. Every change publishes the full list
/// to subscribers.
#[derive(Default)]
pub struct RunHistory {
  runs: Mutex<Vec<ExecutionRun>>,
  bus: EventBus<Vec<ExecutionRun>>,
}

impl RunHistory {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn bus(&self) -> &EventBus<Vec<ExecutionRun>> {
    &self.bus
  }

  pub fn push(&self, run: ExecutionRun) {
    let snapshot = {
      let mut runs = self.runs.lock().unwrap();
      runs.push(run);
      runs.clone()
    };
    self.bus.emit(&snapshot);
  }

  /// Apply `change` to a run and publish. `change` returns whether it
  /// modified anything; unchanged runs are not republished.
  ///
  /// Returns the run after the change, or `None` if it is unknown.
  pub fn update(
    &self,
    run_id: &str,
    change: impl FnOnce(&mut ExecutionRun) -> bool,
  ) -> Option<(ExecutionRun, bool)> {
    let (run, changed, snapshot) = {
      let mut runs = self.runs.lock().unwrap();
      let run = runs.iter_mut().find(|run| run.id == run_id)?;
      let changed = change(run);
      let run = run.clone();
      (run, changed, changed.then(|| runs.clone()))
    };
    if let Some(snapshot) = snapshot {
      self.bus.emit(&snapshot);
    }
    Some((run, changed))
  }

  pub fn get(&self, run_id: &str) -> Option<ExecutionRun> {
    self
      .runs
      .lock()
      .unwrap()
      .iter()
      .find(|run| run.id == run_id)
      .cloned()
  }

  pub fn snapshot(&self) -> Vec<ExecutionRun> {
    self.runs.lock().unwrap().clone()
  }
}

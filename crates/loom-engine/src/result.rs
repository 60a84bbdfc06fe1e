//! Node results and run metrics.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The recorded outcome of one node execution.
///
/// Serializes as the handler's output object with `executionTimeMs` and
/// `success` added alongside. Failed results carry an `error` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
  #[serde(flatten)]
  pub output: Map<String, Value>,
  pub execution_time_ms: u64,
  pub success: bool,
}

impl NodeResult {
  /// Wrap a handler's output. Non-object outputs are stored under `value`.
  pub fn success(output: Value, execution_time_ms: u64) -> Self {
    let mut output = match output {
      Value::Object(map) => map,
      other => {
        let mut map = Map::new();
        map.insert("value".to_string(), other);
        map
      }
    };
    output.remove("success");
    output.remove("executionTimeMs");
    Self {
      output,
      execution_time_ms,
      success: true,
    }
  }

  pub fn failure(error: impl Into<String>, execution_time_ms: u64) -> Self {
    let mut output = Map::new();
    output.insert("error".to_string(), Value::String(error.into()));
    Self {
      output,
      execution_time_ms,
      success: false,
    }
  }

  /// The error message of a failed result.
  pub fn error(&self) -> Option<&str> {
    if self.success {
      return None;
    }
    self.output.get("error").and_then(Value::as_str)
  }

  /// The serialized shape seen by downstream nodes and subscribers.
  pub fn to_value(&self) -> Value {
    let mut map = self.output.clone();
    map.insert(
      "executionTimeMs".to_string(),
      Value::from(self.execution_time_ms),
    );
    map.insert("success".to_string(), Value::Bool(self.success));
    Value::Object(map)
  }
}

/// Results recorded for one run, keyed by node id.
///
/// Writes happen only after a node's handler settles. A re-executed node
/// overwrites its earlier entry. Nodes whose handler has started but not
/// settled are tracked separately until their result arrives.
#[derive(Debug, Default)]
pub struct RunResults {
  results: Mutex<HashMap<String, NodeResult>>,
  running: Mutex<HashMap<String, Instant>>,
}

impl RunResults {
  pub fn new() -> Self {
    Self::default()
  }

  /// Note that `node_id` has been dispatched and has no result yet.
  pub fn mark_running(&self, node_id: &str) {
    self
      .running
      .lock()
      .unwrap()
      .insert(node_id.to_string(), Instant::now());
  }

  /// Nodes still running, with their elapsed milliseconds, ordered by id.
  /// They are no longer tracked afterwards.
  pub fn take_running(&self) -> Vec<(String, u64)> {
    let mut running: Vec<(String, u64)> = self
      .running
      .lock()
      .unwrap()
      .drain()
      .map(|(id, started)| (id, started.elapsed().as_millis() as u64))
      .collect();
    running.sort();
    running
  }

  pub fn insert(&self, node_id: &str, result: NodeResult) {
    self.running.lock().unwrap().remove(node_id);
    self
      .results
      .lock()
      .unwrap()
      .insert(node_id.to_string(), result);
  }

  pub fn get(&self, node_id: &str) -> Option<NodeResult> {
    self.results.lock().unwrap().get(node_id).cloned()
  }

  /// A point-in-time copy, ordered by node id.
  pub fn snapshot(&self) -> BTreeMap<String, NodeResult> {
    self
      .results
      .lock()
      .unwrap()
      .iter()
      .map(|(id, result)| (id.clone(), result.clone()))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.results.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Aggregate statistics for a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
  #[serde(rename = "totalExecutionTime")]
  pub total_execution_time_ms: u64,
  pub node_execution_times: BTreeMap<String, u64>,
  pub success_rate: f64,
}

impl Metrics {
  /// Compute metrics from the recorded results. An empty run has a
  /// success rate of 1.
  pub fn compute(results: &BTreeMap<String, NodeResult>, total_execution_time_ms: u64) -> Self {
    let node_execution_times = results
      .iter()
      .map(|(id, result)| (id.clone(), result.execution_time_ms))
      .collect();

    let success_rate = if results.is_empty() {
      1.0
    } else {
      let successes = results.values().filter(|r| r.success).count();
      successes as f64 / results.len() as f64
    };

    Self {
      total_execution_time_ms,
      node_execution_times,
      success_rate,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_scalar_output_wrapped_as_value() {
    let result = NodeResult::success(json!(42), 3);
    assert_eq!(result.to_value(), json!({"value": 42, "executionTimeMs": 3, "success": true}));
  }

  #[test]
  fn test_reserved_keys_do_not_shadow_bookkeeping() {
    let result = NodeResult::success(json!({"success": false, "x": 1}), 0);
    assert!(result.success);
    assert_eq!(result.to_value()["x"], 1);
    assert_eq!(result.to_value()["success"], true);
  }

  #[test]
  fn test_failure_carries_error() {
    let result = NodeResult::failure("boom", 7);
    assert_eq!(result.error(), Some("boom"));
    assert_eq!(
      serde_json::to_value(&result).unwrap(),
      json!({"error": "boom", "executionTimeMs": 7, "success": false})
    );
  }

  #[test]
  fn test_running_nodes_cleared_by_result() {
    let results = RunResults::new();
    results.mark_running("b");
    results.mark_running("a");
    results.mark_running("c");
    results.insert("c", NodeResult::success(json!({}), 1));

    let running: Vec<String> = results.take_running().into_iter().map(|(id, _)| id).collect();
    assert_eq!(running, vec!["a", "b"]);
    assert!(results.take_running().is_empty());
    assert_eq!(results.len(), 1);
  }

  #[test]
  fn test_metrics_success_rate() {
    let mut results = BTreeMap::new();
    results.insert("a".to_string(), NodeResult::success(json!({}), 5));
    results.insert("b".to_string(), NodeResult::failure("x", 2));
    results.insert("c".to_string(), NodeResult::success(json!({}), 1));

    let metrics = Metrics::compute(&results, 10);
    assert!((metrics.success_rate - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.node_execution_times["a"], 5);
    assert_eq!(metrics.total_execution_time_ms, 10);
  }

  #[test]
  fn test_empty_run_success_rate_is_one() {
    let metrics = Metrics::compute(&BTreeMap::new(), 0);
    assert_eq!(metrics.success_rate, 1.0);
    assert!(metrics.node_execution_times.is_empty());
  }
}

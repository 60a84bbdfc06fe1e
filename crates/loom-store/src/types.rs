use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Lifecycle status of a workflow run.
///
/// Runs only move forward: `pending -> running -> completed | failed | aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Aborted,
}

impl ExecutionStatus {
  /// Whether no further transition is allowed.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Aborted
    )
  }

  /// Whether moving from `self` to `next` is a forward transition.
  pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
    match self {
      ExecutionStatus::Pending => next != ExecutionStatus::Pending,
      ExecutionStatus::Running => next.is_terminal(),
      _ => false,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ExecutionStatus::Pending => "pending",
      ExecutionStatus::Running => "running",
      ExecutionStatus::Completed => "completed",
      ExecutionStatus::Failed => "failed",
      ExecutionStatus::Aborted => "aborted",
    }
  }
}

/// A workflow run as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub started_at: DateTime<Utc>,
  pub ended_at: Option<DateTime<Utc>>,
  pub node_results: Json<serde_json::Value>,
  pub metrics: Option<Json<serde_json::Value>>,
  pub error: Option<String>,
}

impl ExecutionRecord {
  /// Minimal record for a run that was aborted before anything was stored.
  pub fn aborted(workflow_id: &str, execution_id: &str, at: DateTime<Utc>) -> Self {
    Self {
      execution_id: execution_id.to_string(),
      workflow_id: workflow_id.to_string(),
      status: ExecutionStatus::Aborted,
      started_at: at,
      ended_at: Some(at),
      node_results: Json(serde_json::json!({})),
      metrics: None,
      error: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_forward_transitions_only() {
    use ExecutionStatus::*;

    assert!(Pending.can_transition_to(Running));
    assert!(Pending.can_transition_to(Failed));
    assert!(Running.can_transition_to(Completed));
    assert!(Running.can_transition_to(Aborted));
    assert!(!Running.can_transition_to(Pending));
    assert!(!Running.can_transition_to(Running));
    assert!(!Aborted.can_transition_to(Failed));
    assert!(!Completed.can_transition_to(Running));
  }

  #[test]
  fn test_status_serializes_snake_case() {
    let json = serde_json::to_value(ExecutionStatus::Aborted).unwrap();
    assert_eq!(json, "aborted");
    assert_eq!(ExecutionStatus::Completed.as_str(), "completed");
  }
}

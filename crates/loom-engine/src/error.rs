//! Error types for workflow execution.

use loom_workflow::WorkflowError;
use thiserror::Error;

/// Errors raised by node handlers.
///
/// Whatever a handler returns is recorded as the node's failed result before
/// the run's retry/continue policy looks at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
  /// The node is missing configuration or a collaborator it needs.
  #[error("{0}")]
  Configuration(String),

  /// A condition or transform expression failed to compile or evaluate.
  #[error("{kind} error: {message}")]
  Expression { kind: &'static str, message: String },

  /// The agent messaging collaborator reported a failure.
  #[error("agent delegation failed: {0}")]
  Delegate(String),

  /// Any other handler failure.
  #[error("{0}")]
  Failed(String),
}

/// Errors that can occur during workflow execution.
///
/// `Clone` so that every dependent of a failed node in a parallel run can
/// report the same failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
  /// The workflow could not be planned (cycle or unreachable nodes).
  #[error(transparent)]
  Plan(#[from] WorkflowError),

  /// A planned or requested node does not exist in the workflow.
  #[error("node '{node_id}' not found")]
  NodeNotFound { node_id: String },

  /// A node handler failed.
  #[error("node '{node_id}' failed: {source}")]
  NodeExecution {
    node_id: String,
    #[source]
    source: HandlerError,
  },

  /// The run was aborted.
  #[error("execution aborted")]
  Aborted,

  /// The run exceeded its `timeout` option.
  #[error("execution timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },
}

impl EngineError {
  /// Node the error originated from, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      EngineError::NodeNotFound { node_id } | EngineError::NodeExecution { node_id, .. } => {
        Some(node_id)
      }
      _ => None,
    }
  }
}

//! Outbound mirroring of run lifecycle events.

use async_trait::async_trait;
use serde_json::Value;

/// Event name sent when a run starts.
pub const EXECUTION_STARTED: &str = "workflow.execution.started";
/// Event name sent when a run completes.
pub const EXECUTION_COMPLETED: &str = "workflow.execution.completed";
/// Event name sent when a run fails.
pub const EXECUTION_FAILED: &str = "workflow.execution.failed";
/// Event name sent when a run is aborted.
pub const EXECUTION_ABORTED: &str = "workflow.execution.aborted";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  #[error("connection failed: {0}")]
  Connection(String),

  #[error("send failed: {0}")]
  Send(String),
}

/// A connected outbound channel (socket, message bus, ...).
///
/// The engine only logs transport failures; a run never fails because of
/// its transport.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn connect(&self) -> Result<(), TransportError>;

  async fn send(&self, event: &str, payload: Value) -> Result<(), TransportError>;
}

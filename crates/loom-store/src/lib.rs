//! Loom Store
//!
//! This crate provides the storage trait and implementations for workflow
//! run records. The engine treats storage as best-effort: it reports each
//! finished or aborted run here and only logs failures.
//!
//! Implementations:
//! - [`SqliteStore`] persists records through `sqlx`
//! - [`MemoryStore`] keeps them in process, for tests and one-shot CLI runs

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{ExecutionRecord, ExecutionStatus};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Running migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage for workflow run records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
  /// Record a finished run. Writing the same execution id again replaces it.
  async fn create_workflow_execution(
    &self,
    workflow_id: &str,
    record: &ExecutionRecord,
  ) -> Result<(), Error>;

  /// Mark a run as aborted, creating a minimal record if none exists yet.
  async fn abort_workflow_execution(&self, workflow_id: &str, execution_id: &str)
  -> Result<(), Error>;

  /// Get a run record by ID.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error>;

  /// List runs of a workflow, newest first.
  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Error>;
}

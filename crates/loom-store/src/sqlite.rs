use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{Error, ExecutionRecord, ExecutionStatus, ExecutionStore};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database at `path` and run migrations.
  pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// An in-memory database, mainly for tests.
  pub async fn in_memory() -> Result<Self, Error> {
    // One connection: every new connection to `:memory:` is a fresh database.
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(&self.pool).await
  }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
  async fn create_workflow_execution(
    &self,
    workflow_id: &str,
    record: &ExecutionRecord,
  ) -> Result<(), Error> {
    sqlx::query(
      r#"
            INSERT INTO workflow_executions
              (execution_id, workflow_id, status, started_at, ended_at, node_results, metrics, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (execution_id) DO UPDATE SET
              status = excluded.status,
              ended_at = excluded.ended_at,
              node_results = excluded.node_results,
              metrics = excluded.metrics,
              error = excluded.error
            "#,
    )
    .bind(&record.execution_id)
    .bind(workflow_id)
    .bind(record.status)
    .bind(record.started_at)
    .bind(record.ended_at)
    .bind(&record.node_results)
    .bind(&record.metrics)
    .bind(&record.error)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn abort_workflow_execution(
    &self,
    workflow_id: &str,
    execution_id: &str,
  ) -> Result<(), Error> {
    let record = ExecutionRecord::aborted(workflow_id, execution_id, Utc::now());

    sqlx::query(
      r#"
            INSERT INTO workflow_executions
              (execution_id, workflow_id, status, started_at, ended_at, node_results)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (execution_id) DO UPDATE SET
              status = excluded.status,
              ended_at = excluded.ended_at
            "#,
    )
    .bind(&record.execution_id)
    .bind(&record.workflow_id)
    .bind(ExecutionStatus::Aborted)
    .bind(record.started_at)
    .bind(record.ended_at)
    .bind(&record.node_results)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    sqlx::query_as(
      r#"
            SELECT execution_id, workflow_id, status, started_at, ended_at, node_results, metrics, error
            FROM workflow_executions
            WHERE execution_id = ?
            "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Error> {
    let records = sqlx::query_as(
      r#"
            SELECT execution_id, workflow_id, status, started_at, ended_at, node_results, metrics, error
            FROM workflow_executions
            WHERE workflow_id = ?
            ORDER BY started_at DESC
            "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(records)
  }
}

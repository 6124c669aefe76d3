use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rcm_capability::PipelineState;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::types::{Checkpoint, RunIdentity, RunUpdate, WorkflowRun};
use crate::{CheckpointStore, RunStore, StoreError};

/// SQLite-based store implementation.
///
/// Durable substitute for the in-memory stores: checkpoints survive process
/// restarts, and workflow runs are queryable after the fact.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

#[derive(FromRow)]
struct CheckpointRow {
  node_index: i64,
  step: String,
  state: Json<PipelineState>,
  saved_at: DateTime<Utc>,
}

impl TryFrom<CheckpointRow> for Checkpoint {
  type Error = StoreError;

  fn try_from(row: CheckpointRow) -> Result<Self, Self::Error> {
    let node_index = usize::try_from(row.node_index).map_err(|_| {
      StoreError::InvalidRecord(format!("negative node index {}", row.node_index))
    })?;
    Ok(Checkpoint {
      node_index,
      step: row.step,
      state: row.state.0,
      saved_at: row.saved_at,
    })
  }
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Connect to a database URL, creating the file if needed, and migrate.
  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    use std::str::FromStr;

    let options =
      sqlx::sqlite::SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}

#[async_trait]
impl CheckpointStore for SqliteStore {
  async fn save(
    &self,
    identity: &RunIdentity,
    node_index: usize,
    step: &str,
    state: &PipelineState,
  ) -> Result<(), StoreError> {
    let node_index = i64::try_from(node_index)
      .map_err(|_| StoreError::InvalidRecord(format!("node index {} out of range", node_index)))?;

    sqlx::query(
      r#"
            INSERT INTO checkpoints (workflow_id, thread_id, node_index, step, state, saved_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (workflow_id, thread_id) DO UPDATE SET
                node_index = excluded.node_index,
                step = excluded.step,
                state = excluded.state,
                saved_at = excluded.saved_at
            "#,
    )
    .bind(&identity.workflow_id)
    .bind(&identity.thread_id)
    .bind(node_index)
    .bind(step)
    .bind(Json(state))
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn load(&self, identity: &RunIdentity) -> Result<Option<Checkpoint>, StoreError> {
    let row: Option<CheckpointRow> = sqlx::query_as(
      r#"
            SELECT node_index, step, state, saved_at
            FROM checkpoints
            WHERE workflow_id = ? AND thread_id = ?
            "#,
    )
    .bind(&identity.workflow_id)
    .bind(&identity.thread_id)
    .fetch_optional(&self.pool)
    .await?;

    row.map(Checkpoint::try_from).transpose()
  }

  async fn clear(&self, identity: &RunIdentity) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            DELETE FROM checkpoints
            WHERE workflow_id = ? AND thread_id = ?
            "#,
    )
    .bind(&identity.workflow_id)
    .bind(&identity.thread_id)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}

#[async_trait]
impl RunStore for SqliteStore {
  async fn create_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
    sqlx::query(
            r#"
            INSERT INTO workflow_runs (workflow_id, thread_id, workflow_type, status, current_step, error_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.workflow_id)
        .bind(&run.thread_id)
        .bind(&run.workflow_type)
        .bind(run.status)
        .bind(&run.current_step)
        .bind(&run.error_message)
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await?;

    Ok(())
  }

  async fn update_run(&self, identity: &RunIdentity, update: RunUpdate) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            UPDATE workflow_runs
            SET status = ?, current_step = ?, error_message = ?, updated_at = ?
            WHERE workflow_id = ? AND thread_id = ?
            "#,
    )
    .bind(update.status)
    .bind(update.current_step)
    .bind(update.error_message)
    .bind(Utc::now())
    .bind(&identity.workflow_id)
    .bind(&identity.thread_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(identity.to_string()));
    }
    Ok(())
  }

  async fn get_run(&self, identity: &RunIdentity) -> Result<WorkflowRun, StoreError> {
    let run: Option<WorkflowRun> = sqlx::query_as(
            r#"
            SELECT workflow_id, thread_id, workflow_type, status, current_step, error_message, created_at, updated_at
            FROM workflow_runs
            WHERE workflow_id = ? AND thread_id = ?
            "#,
        )
        .bind(&identity.workflow_id)
        .bind(&identity.thread_id)
        .fetch_optional(&self.pool)
        .await?;

    run.ok_or_else(|| StoreError::NotFound(identity.to_string()))
  }

  async fn list_runs(&self) -> Result<Vec<WorkflowRun>, StoreError> {
    let runs = sqlx::query_as(
            r#"
            SELECT workflow_id, thread_id, workflow_type, status, current_step, error_message, created_at, updated_at
            FROM workflow_runs
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

    Ok(runs)
  }
}

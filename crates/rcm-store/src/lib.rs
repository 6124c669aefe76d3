//! RCM Store
//!
//! Storage seams for the RCM pipeline:
//! - [`CheckpointStore`] keeps the state after each completed node, keyed by
//!   [`RunIdentity`], so a run can resume from its last completed node.
//! - [`RunStore`] records workflow runs (status, current step, error) for
//!   reporting.
//!
//! [`InMemoryCheckpointStore`] and [`InMemoryRunStore`] live for the
//! process lifetime. [`SqliteStore`] implements both traits durably.

mod memory;
mod sqlite;
mod types;

pub use memory::{InMemoryCheckpointStore, InMemoryRunStore};
pub use sqlite::SqliteStore;
pub use types::{Checkpoint, RunIdentity, RunStatus, RunUpdate, WorkflowRun};

use async_trait::async_trait;
use rcm_capability::PipelineState;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("migration failed: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  /// A stored record could not be decoded.
  #[error("invalid stored record: {0}")]
  InvalidRecord(String),

  #[error("store lock poisoned: {0}")]
  LockPoisoned(String),
}

/// Storage for run checkpoints.
///
/// Only the latest checkpoint per identity is kept. Implementations must
/// make `save` visible to `load` once the returned future completes.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
  /// Record the state after the node at `node_index` completed.
  async fn save(
    &self,
    identity: &RunIdentity,
    node_index: usize,
    step: &str,
    state: &PipelineState,
  ) -> Result<(), StoreError>;

  /// The latest checkpoint for a run, if any.
  async fn load(&self, identity: &RunIdentity) -> Result<Option<Checkpoint>, StoreError>;

  /// Drop the checkpoint for a run.
  async fn clear(&self, identity: &RunIdentity) -> Result<(), StoreError>;
}

/// Storage for workflow-run records.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Record a new run.
  async fn create_run(&self, run: &WorkflowRun) -> Result<(), StoreError>;

  /// Update status, current step, and error of a recorded run.
  async fn update_run(&self, identity: &RunIdentity, update: RunUpdate) -> Result<(), StoreError>;

  /// Get a run by identity.
  async fn get_run(&self, identity: &RunIdentity) -> Result<WorkflowRun, StoreError>;

  /// List all runs, newest first.
  async fn list_runs(&self) -> Result<Vec<WorkflowRun>, StoreError>;
}

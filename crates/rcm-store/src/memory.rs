use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use rcm_capability::PipelineState;

use crate::types::{Checkpoint, RunIdentity, RunUpdate, WorkflowRun};
use crate::{CheckpointStore, RunStore, StoreError};

/// Process-lifetime checkpoint store.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
  checkpoints: RwLock<HashMap<RunIdentity, Checkpoint>>,
}

impl InMemoryCheckpointStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of runs with a checkpoint.
  pub fn len(&self) -> usize {
    self
      .checkpoints
      .read()
      .map(|checkpoints| checkpoints.len())
      .unwrap_or_else(|e| e.into_inner().len())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
  async fn save(
    &self,
    identity: &RunIdentity,
    node_index: usize,
    step: &str,
    state: &PipelineState,
  ) -> Result<(), StoreError> {
    let checkpoint = Checkpoint {
      node_index,
      step: step.to_string(),
      state: state.clone(),
      saved_at: Utc::now(),
    };

    let mut checkpoints = self
      .checkpoints
      .write()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    checkpoints.insert(identity.clone(), checkpoint);
    Ok(())
  }

  async fn load(&self, identity: &RunIdentity) -> Result<Option<Checkpoint>, StoreError> {
    let checkpoints = self
      .checkpoints
      .read()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    Ok(checkpoints.get(identity).cloned())
  }

  async fn clear(&self, identity: &RunIdentity) -> Result<(), StoreError> {
    let mut checkpoints = self
      .checkpoints
      .write()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    checkpoints.remove(identity);
    Ok(())
  }
}

/// Process-lifetime run records.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
  runs: RwLock<HashMap<RunIdentity, WorkflowRun>>,
}

impl InMemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
  async fn create_run(&self, run: &WorkflowRun) -> Result<(), StoreError> {
    let mut runs = self
      .runs
      .write()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    runs.insert(run.identity(), run.clone());
    Ok(())
  }

  async fn update_run(&self, identity: &RunIdentity, update: RunUpdate) -> Result<(), StoreError> {
    let mut runs = self
      .runs
      .write()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    let run = runs
      .get_mut(identity)
      .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;

    run.status = update.status;
    run.current_step = update.current_step;
    run.error_message = update.error_message;
    run.updated_at = Utc::now();
    Ok(())
  }

  async fn get_run(&self, identity: &RunIdentity) -> Result<WorkflowRun, StoreError> {
    let runs = self
      .runs
      .read()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    runs
      .get(identity)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(identity.to_string()))
  }

  async fn list_runs(&self) -> Result<Vec<WorkflowRun>, StoreError> {
    let runs = self
      .runs
      .read()
      .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
    let mut list: Vec<WorkflowRun> = runs.values().cloned().collect();
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(list)
  }
}

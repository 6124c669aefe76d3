//! Persists execution events as workflow-run records.

use std::collections::HashMap;
use std::sync::Arc;

use rcm_store::{RunIdentity, RunStatus, RunStore, RunUpdate, StoreError, WorkflowRun};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::{ChannelNotifier, ExecutionEvent};

/// Consumes execution events and keeps a [`RunStore`] in step with them.
///
/// Recording is best-effort: a store failure is logged and never reaches the
/// executor.
pub struct RunRecorder {
  store: Arc<dyn RunStore>,
  receiver: mpsc::UnboundedReceiver<ExecutionEvent>,
  current_steps: HashMap<RunIdentity, String>,
}

impl RunRecorder {
  /// Create a recorder and the notifier that feeds it.
  pub fn new(store: Arc<dyn RunStore>) -> (Self, ChannelNotifier) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let recorder = Self {
      store,
      receiver,
      current_steps: HashMap::new(),
    };
    (recorder, ChannelNotifier::new(sender))
  }

  /// Record events until every notifier has been dropped.
  pub async fn run(mut self) {
    while let Some(event) = self.receiver.recv().await {
      if let Err(e) = self.record(&event).await {
        warn!(
          identity = %event.identity(),
          error = %e,
          "run_record_failed"
        );
      }
    }
    debug!("run_recorder_stopped");
  }

  /// Apply a single event to the store.
  pub async fn record(&mut self, event: &ExecutionEvent) -> Result<(), StoreError> {
    match event {
      ExecutionEvent::WorkflowStarted {
        identity,
        workflow_type,
        ..
      } => {
        // A fresh start of an identity already on record restarts its row
        self.current_steps.remove(identity);
        let update = self.update(identity, RunStatus::Started, None);
        match self.store.update_run(identity, update).await {
          Err(StoreError::NotFound(_)) => {
            let run = WorkflowRun::started(identity, workflow_type.clone().unwrap_or_default());
            self.store.create_run(&run).await
          }
          other => other,
        }
      }

      ExecutionEvent::WorkflowResumed {
        identity,
        workflow_type,
        ..
      } => {
        let update = self.update(identity, RunStatus::InProgress, None);
        match self.store.update_run(identity, update.clone()).await {
          // Runs recorded by an earlier process may be missing
          Err(StoreError::NotFound(_)) => {
            let run = WorkflowRun::started(identity, workflow_type.clone().unwrap_or_default());
            self.store.create_run(&run).await?;
            self.store.update_run(identity, update).await
          }
          other => other,
        }
      }

      ExecutionEvent::StepStarted { identity, step, .. } => {
        self.current_steps.insert(identity.clone(), step.clone());
        let update = self.update(identity, RunStatus::InProgress, None);
        self.store.update_run(identity, update).await
      }

      ExecutionEvent::StepCompleted { .. } | ExecutionEvent::StepFailed { .. } => Ok(()),

      ExecutionEvent::WorkflowCompleted { identity } => {
        let update = self.update(identity, RunStatus::Completed, None);
        self.current_steps.remove(identity);
        self.store.update_run(identity, update).await
      }

      ExecutionEvent::WorkflowFailed { identity, error } => {
        let update = self.update(identity, RunStatus::Failed, Some(error.clone()));
        self.current_steps.remove(identity);
        self.store.update_run(identity, update).await
      }
    }
  }

  fn update(
    &self,
    identity: &RunIdentity,
    status: RunStatus,
    error_message: Option<String>,
  ) -> RunUpdate {
    RunUpdate {
      status,
      current_step: self.current_steps.get(identity).cloned(),
      error_message,
    }
  }
}

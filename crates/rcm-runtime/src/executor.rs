//! Workflow executor implementation.

use std::sync::Arc;

use rcm_capability::{PipelineState, StepContext};
use rcm_store::{CheckpointStore, InMemoryCheckpointStore, RunIdentity};
use rcm_workflow::StepGraph;
use tracing::{debug, error, info, instrument};

use crate::error::ExecutionError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};

/// The workflow executor.
///
/// Walks a step graph node by node, threading a single [`PipelineState`]
/// through every capability, and checkpoints the state after each node.
#[derive(Clone)]
pub struct WorkflowExecutor {
  checkpoints: Arc<dyn CheckpointStore>,
  notifier: Arc<dyn ExecutionNotifier>,
}

impl WorkflowExecutor {
  /// Create an executor backed by the given checkpoint store.
  pub fn new(checkpoints: Arc<dyn CheckpointStore>) -> Self {
    Self {
      checkpoints,
      notifier: Arc::new(NoopNotifier),
    }
  }

  /// Create an executor with process-lifetime checkpoints.
  pub fn in_memory() -> Self {
    Self::new(Arc::new(InMemoryCheckpointStore::new()))
  }

  /// Send execution events to `notifier`.
  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
    &self.checkpoints
  }

  /// Execute a graph for the given run identity.
  ///
  /// If the checkpoint store holds a checkpoint for `identity`, execution
  /// resumes after the checkpointed node with the checkpointed state and
  /// `initial_state` is ignored. Otherwise execution starts at the entry node
  /// with `initial_state`.
  ///
  /// Returns the state as it stands when the end sentinel is reached. A
  /// failing node aborts the run and no state is returned.
  #[instrument(
    name = "workflow_run",
    skip(self, graph, initial_state, identity),
    fields(
      workflow_id = %identity.workflow_id,
      thread_id = %identity.thread_id,
    )
  )]
  pub async fn run(
    &self,
    graph: &StepGraph,
    initial_state: PipelineState,
    identity: &RunIdentity,
  ) -> Result<PipelineState, ExecutionError> {
    let (start, state) = self.resume_point(graph, initial_state, identity).await?;

    if start == 0 {
      info!(steps = ?graph.step_names(), "workflow_started");
      self.notifier.notify(ExecutionEvent::WorkflowStarted {
        identity: identity.clone(),
        workflow_type: state.workflow_type().map(str::to_string),
        steps: graph.step_names().into_iter().map(str::to_string).collect(),
      });
    } else {
      info!(from_node = start, "workflow_resumed");
      self.notifier.notify(ExecutionEvent::WorkflowResumed {
        identity: identity.clone(),
        workflow_type: state.workflow_type().map(str::to_string),
        from_node: start,
      });
    }

    let result = self.run_from(graph, start, state, identity).await;

    match &result {
      Ok(_) => {
        info!("workflow_completed");
        self.notifier.notify(ExecutionEvent::WorkflowCompleted {
          identity: identity.clone(),
        });
      }
      Err(e) => {
        error!(error = %e, "workflow_failed");
        self.notifier.notify(ExecutionEvent::WorkflowFailed {
          identity: identity.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  /// Work out where to start: after the checkpointed node, or at the entry.
  async fn resume_point(
    &self,
    graph: &StepGraph,
    initial_state: PipelineState,
    identity: &RunIdentity,
  ) -> Result<(usize, PipelineState), ExecutionError> {
    let Some(checkpoint) = self.checkpoints.load(identity).await? else {
      return Ok((0, initial_state));
    };

    let node = graph
      .node(checkpoint.node_index)
      .ok_or_else(|| ExecutionError::CheckpointMismatch {
        identity: identity.to_string(),
        message: format!(
          "checkpoint is at node {} but the graph has {} nodes",
          checkpoint.node_index,
          graph.len()
        ),
      })?;

    if node.step() != checkpoint.step {
      return Err(ExecutionError::CheckpointMismatch {
        identity: identity.to_string(),
        message: format!(
          "node {} is '{}' in the graph but '{}' in the checkpoint",
          checkpoint.node_index,
          node.step(),
          checkpoint.step
        ),
      });
    }

    Ok((checkpoint.node_index + 1, checkpoint.state))
  }

  /// Run nodes from `start` to the end sentinel.
  async fn run_from(
    &self,
    graph: &StepGraph,
    start: usize,
    mut state: PipelineState,
    identity: &RunIdentity,
  ) -> Result<PipelineState, ExecutionError> {
    for node in graph.path_from(start) {
      let ctx = StepContext {
        step: node.step().to_string(),
        node_index: node.index(),
        workflow_id: identity.workflow_id.clone(),
        thread_id: identity.thread_id.clone(),
      };

      info!(step = %ctx.step, node_index = ctx.node_index, "step_started");
      self.notifier.notify(ExecutionEvent::StepStarted {
        identity: identity.clone(),
        node_index: ctx.node_index,
        step: ctx.step.clone(),
      });

      let keys_before: Vec<String> = state.keys().map(str::to_string).collect();

      state = match node.capability().invoke(state, &ctx).await {
        Ok(next) => next,
        Err(source) => {
          error!(step = %ctx.step, node_index = ctx.node_index, error = %source, "step_failed");
          self.notify_step_failed(identity, &ctx, source.to_string());
          return Err(ExecutionError::Capability {
            step: ctx.step,
            node_index: ctx.node_index,
            source,
          });
        }
      };

      let missing: Vec<String> = keys_before
        .into_iter()
        .filter(|key| !state.contains_key(key))
        .collect();
      if !missing.is_empty() {
        let err = ExecutionError::StateKeysDropped {
          step: ctx.step.clone(),
          node_index: ctx.node_index,
          missing,
        };
        error!(step = %ctx.step, node_index = ctx.node_index, error = %err, "step_failed");
        self.notify_step_failed(identity, &ctx, err.to_string());
        return Err(err);
      }

      // Must land before the next node starts
      self
        .checkpoints
        .save(identity, ctx.node_index, &ctx.step, &state)
        .await?;
      debug!(step = %ctx.step, node_index = ctx.node_index, "checkpoint_saved");

      info!(step = %ctx.step, node_index = ctx.node_index, "step_completed");
      self.notifier.notify(ExecutionEvent::StepCompleted {
        identity: identity.clone(),
        node_index: ctx.node_index,
        output: state.step_output(&ctx.step).cloned(),
        step: ctx.step,
      });
    }

    Ok(state)
  }

  fn notify_step_failed(&self, identity: &RunIdentity, ctx: &StepContext, error: String) {
    self.notifier.notify(ExecutionEvent::StepFailed {
      identity: identity.clone(),
      node_index: ctx.node_index,
      step: ctx.step.clone(),
      error,
    });
  }
}

//! Execution events and notifiers for observability.
//!
//! Events are emitted during a run so consumers can observe progress and
//! persist it. Notifiers never influence the run itself.

use rcm_store::RunIdentity;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// A run has started from its entry node.
  WorkflowStarted {
    identity: RunIdentity,
    workflow_type: Option<String>,
    steps: Vec<String>,
  },

  /// A run has resumed after its last checkpointed node.
  WorkflowResumed {
    identity: RunIdentity,
    workflow_type: Option<String>,
    from_node: usize,
  },

  /// A node has started executing.
  StepStarted {
    identity: RunIdentity,
    node_index: usize,
    step: String,
  },

  /// A node has completed and its checkpoint is saved.
  StepCompleted {
    identity: RunIdentity,
    node_index: usize,
    step: String,
    output: Option<serde_json::Value>,
  },

  /// A node has failed.
  StepFailed {
    identity: RunIdentity,
    node_index: usize,
    step: String,
    error: String,
  },

  /// The run reached the end sentinel.
  WorkflowCompleted { identity: RunIdentity },

  /// The run was aborted.
  WorkflowFailed { identity: RunIdentity, error: String },
}

impl ExecutionEvent {
  /// The run this event belongs to.
  pub fn identity(&self) -> &RunIdentity {
    match self {
      ExecutionEvent::WorkflowStarted { identity, .. }
      | ExecutionEvent::WorkflowResumed { identity, .. }
      | ExecutionEvent::StepStarted { identity, .. }
      | ExecutionEvent::StepCompleted { identity, .. }
      | ExecutionEvent::StepFailed { identity, .. }
      | ExecutionEvent::WorkflowCompleted { identity }
      | ExecutionEvent::WorkflowFailed { identity, .. } => identity,
    }
  }
}

/// Trait for receiving execution events.
///
/// The executor calls `notify` for each event; implementations decide what
/// to do with them (persist, broadcast, ignore).
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Pair with [`RunRecorder`](crate::RunRecorder) to persist runs without
/// blocking the executor on storage.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // NOTE: Unbounded so a slow consumer never stalls a run. Volume is a
  // handful of events per step.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

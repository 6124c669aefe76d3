//! Error types for workflow execution.

use rcm_capability::CapabilityError;
use rcm_store::StoreError;
use thiserror::Error;

/// Errors that can occur during workflow execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// A capability failed. The run was aborted at this node.
  #[error("step '{step}' (node {node_index}) failed: {source}")]
  Capability {
    step: String,
    node_index: usize,
    #[source]
    source: CapabilityError,
  },

  /// A capability returned a state missing keys that were present before it ran.
  #[error("step '{step}' (node {node_index}) dropped state keys: {}", missing.join(", "))]
  StateKeysDropped {
    step: String,
    node_index: usize,
    missing: Vec<String>,
  },

  /// The stored checkpoint does not belong to this graph.
  #[error("checkpoint for run '{identity}' does not match the graph: {message}")]
  CheckpointMismatch { identity: String, message: String },

  /// Reading or writing a checkpoint failed.
  #[error("checkpoint store failed: {0}")]
  Checkpoint(#[from] StoreError),
}

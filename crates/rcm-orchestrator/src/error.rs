use rcm_runtime::ExecutionError;
use rcm_workflow::WorkflowError;
use thiserror::Error;

/// Errors surfaced to callers of the pipeline entry point.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// The workflow type is not one of the known presets. Nothing ran.
  #[error("invalid workflow type: {workflow_type}")]
  InvalidWorkflowType { workflow_type: String },

  /// The step list could not be turned into a graph. Nothing ran.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// The run was aborted by a capability or the executor.
  #[error(transparent)]
  Execution(#[from] ExecutionError),
}

impl PipelineError {
  /// Whether the caller sent a bad request, as opposed to the run failing.
  pub fn is_client_error(&self) -> bool {
    match self {
      PipelineError::InvalidWorkflowType { .. } | PipelineError::Workflow(_) => true,
      PipelineError::Execution(_) => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_client_errors() {
    let invalid = PipelineError::InvalidWorkflowType {
      workflow_type: "partial".to_string(),
    };
    assert!(invalid.is_client_error());
    assert_eq!(invalid.to_string(), "invalid workflow type: partial");

    assert!(PipelineError::from(WorkflowError::EmptyWorkflow).is_client_error());
  }

  #[test]
  fn test_execution_errors_are_server_side() {
    let err = PipelineError::from(ExecutionError::CheckpointMismatch {
      identity: "wf/thread".to_string(),
      message: "different graph".to_string(),
    });
    assert!(!err.is_client_error());
  }
}

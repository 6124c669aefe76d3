use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("cannot build a workflow from an empty step list")]
  EmptyWorkflow,

  #[error("unknown step '{step}' at position {position}")]
  UnknownStep { step: String, position: usize },
}

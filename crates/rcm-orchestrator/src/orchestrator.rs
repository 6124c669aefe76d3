use std::sync::Arc;

use rcm_capability::{PipelineState, StepRegistry};
use rcm_config::WorkflowType;
use rcm_runtime::WorkflowExecutor;
use rcm_store::{CheckpointStore, RunIdentity};
use rcm_workflow::{GraphShape, StepGraph};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::PipelineError;

/// A request to run the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
  /// Preset tag. Always validated, and recorded in the initial state.
  pub workflow_type: String,
  /// Explicit ordered step list. Replaces the preset's list when present.
  #[serde(default)]
  pub steps: Option<Vec<String>>,
  #[serde(default)]
  pub file_path: Option<String>,
  #[serde(default)]
  pub source: Option<String>,
}

impl PipelineRequest {
  pub fn new(workflow_type: impl Into<String>) -> Self {
    Self {
      workflow_type: workflow_type.into(),
      ..Self::default()
    }
  }

  pub fn with_steps<I, S>(mut self, steps: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.steps = Some(steps.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
    self.file_path = Some(file_path.into());
    self
  }

  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.source = Some(source.into());
    self
  }

  /// The state a fresh run starts from.
  fn initial_state(&self) -> PipelineState {
    let mut state = PipelineState::new(&self.workflow_type);
    if let Some(file_path) = &self.file_path {
      state = state.with_file_path(file_path);
    }
    if let Some(source) = &self.source {
      state = state.with_source(source);
    }
    state
  }
}

/// Result of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
  pub identity: RunIdentity,
  pub steps: Vec<String>,
  pub final_state: PipelineState,
}

/// Drives a pipeline run from request to final state.
///
/// Shared between concurrent runs; each run gets its own graph, state and
/// identity.
#[derive(Clone)]
pub struct Orchestrator {
  registry: Arc<StepRegistry>,
  executor: WorkflowExecutor,
}

impl Orchestrator {
  pub fn new(registry: Arc<StepRegistry>, executor: WorkflowExecutor) -> Self {
    Self { registry, executor }
  }

  pub fn registry(&self) -> &StepRegistry {
    &self.registry
  }

  pub fn executor(&self) -> &WorkflowExecutor {
    &self.executor
  }

  /// Resolve a request to its preset and concrete ordered step list.
  pub fn resolve_steps(
    &self,
    request: &PipelineRequest,
  ) -> Result<(WorkflowType, Vec<String>), PipelineError> {
    let workflow_type: WorkflowType =
      request
        .workflow_type
        .parse()
        .map_err(|_| PipelineError::InvalidWorkflowType {
          workflow_type: request.workflow_type.clone(),
        })?;

    let steps = match &request.steps {
      Some(steps) => steps.clone(),
      None => workflow_type.step_names(),
    };
    Ok((workflow_type, steps))
  }

  /// Build the graph a request would run, without running it.
  pub fn plan(&self, request: &PipelineRequest) -> Result<GraphShape, PipelineError> {
    let (_, steps) = self.resolve_steps(request)?;
    let graph = StepGraph::build(&steps, &self.registry)?;
    Ok(graph.describe())
  }

  /// Run the pipeline under a freshly generated run identity.
  pub async fn run_pipeline(
    &self,
    request: PipelineRequest,
  ) -> Result<PipelineOutcome, PipelineError> {
    let identity = RunIdentity::fresh(uuid::Uuid::new_v4().to_string());
    self.execute(identity, request).await
  }

  /// Run the pipeline under an identity chosen by the caller.
  ///
  /// Lets the caller tag artifacts with the identity before the run starts.
  /// Behaves like [`resume`](Self::resume) if the identity has a checkpoint.
  pub async fn run_with_identity(
    &self,
    identity: RunIdentity,
    request: PipelineRequest,
  ) -> Result<PipelineOutcome, PipelineError> {
    self.execute(identity, request).await
  }

  /// Re-invoke a run under an existing identity.
  ///
  /// Continues after the last checkpointed node when one exists. Completed
  /// runs drop their checkpoint, so resuming one starts it over.
  pub async fn resume(
    &self,
    identity: RunIdentity,
    request: PipelineRequest,
  ) -> Result<PipelineOutcome, PipelineError> {
    self.execute(identity, request).await
  }

  #[instrument(
    name = "pipeline",
    skip(self, identity, request),
    fields(
      workflow_id = %identity.workflow_id,
      thread_id = %identity.thread_id,
      workflow_type = %request.workflow_type,
    )
  )]
  async fn execute(
    &self,
    identity: RunIdentity,
    request: PipelineRequest,
  ) -> Result<PipelineOutcome, PipelineError> {
    let (workflow_type, steps) = self.resolve_steps(&request).inspect_err(|e| {
      warn!(error = %e, "pipeline_rejected");
    })?;

    let graph = StepGraph::build(&steps, &self.registry).inspect_err(|e| {
      warn!(error = %e, "pipeline_rejected");
    })?;

    info!(
      preset = %workflow_type,
      steps = ?steps,
      overridden = request.steps.is_some(),
      "pipeline_resolved"
    );

    let final_state = self
      .executor
      .run(&graph, request.initial_state(), &identity)
      .await?;

    // Only failed runs are resumable
    if let Err(e) = self.executor.checkpoints().clear(&identity).await {
      warn!(error = %e, "checkpoint_clear_failed");
    }

    Ok(PipelineOutcome {
      identity,
      steps,
      final_state,
    })
  }
}

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::state::PipelineState;

/// Where in a run a capability is being invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
  /// Step name of the node being executed. Also the state key for its output.
  pub step: String,
  /// Position of the node in the step graph.
  pub node_index: usize,
  pub workflow_id: String,
  pub thread_id: String,
}

/// One unit of RCM work.
///
/// A capability takes ownership of the current state and hands back the
/// updated state with its own output key set. It may read any key already
/// present, and must not drop keys it did not write.
#[async_trait]
pub trait Capability: Send + Sync {
  async fn invoke(
    &self,
    state: PipelineState,
    ctx: &StepContext,
  ) -> Result<PipelineState, CapabilityError>;
}

/// Adapts a plain function into a [`Capability`].
///
/// Useful for in-process capabilities that need no I/O.
pub struct FnCapability<F> {
  f: F,
}

impl<F> FnCapability<F>
where
  F: Fn(PipelineState, &StepContext) -> Result<PipelineState, CapabilityError> + Send + Sync,
{
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F> Capability for FnCapability<F>
where
  F: Fn(PipelineState, &StepContext) -> Result<PipelineState, CapabilityError> + Send + Sync,
{
  async fn invoke(
    &self,
    state: PipelineState,
    ctx: &StepContext,
  ) -> Result<PipelineState, CapabilityError> {
    (self.f)(state, ctx)
  }
}

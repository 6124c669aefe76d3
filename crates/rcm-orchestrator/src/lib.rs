//! RCM Orchestrator
//!
//! The pipeline entry point. Resolves a requested workflow type (and any
//! explicit step overrides) to an ordered step list, builds the step graph,
//! and drives the [`WorkflowExecutor`](rcm_runtime::WorkflowExecutor) with a
//! fresh run identity.

mod error;
mod orchestrator;

pub use error::PipelineError;
pub use orchestrator::{Orchestrator, PipelineOutcome, PipelineRequest};

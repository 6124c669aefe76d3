//! RCM Runtime
//!
//! This crate provides the [`WorkflowExecutor`], which walks a
//! [`StepGraph`](rcm_workflow::StepGraph) from its entry node to the end
//! sentinel, invoking each node's capability with the current state.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     WorkflowExecutor                         │
//! │  - run(graph, state, identity) → final state                 │
//! │  - resumes from the last checkpoint for the identity         │
//! │  - saves a checkpoint after every completed node             │
//! └──────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌──────────────────────┐           ┌──────────────────────────┐
//! │   CheckpointStore    │           │   ExecutionNotifier      │
//! │  (memory / sqlite)   │           │  → RunRecorder → RunStore│
//! └──────────────────────┘           └──────────────────────────┘
//! ```
//!
//! Steps run strictly one after another. A failing capability aborts the
//! run; nothing is retried or skipped.

mod error;
mod events;
mod executor;
mod recorder;

pub use error::ExecutionError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use executor::WorkflowExecutor;
pub use recorder::RunRecorder;

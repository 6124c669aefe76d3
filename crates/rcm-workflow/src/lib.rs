//! RCM Workflow
//!
//! Turns an ordered list of step names into a [`StepGraph`]: one node per
//! requested step bound to its capability, a single chain of edges in input
//! order, the first node as entry, and the [`Target::End`] sentinel after
//! the last node.
//!
//! The graph is always a simple path. Repeated step names produce distinct
//! nodes bound to the same capability.

mod error;
mod graph;

pub use error::WorkflowError;
pub use graph::{END, GraphShape, NodeShape, PathIter, StepGraph, StepNode, Target};

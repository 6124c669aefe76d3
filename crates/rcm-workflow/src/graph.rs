use std::fmt;
use std::sync::Arc;

use rcm_capability::{Capability, StepRegistry};
use serde::{Serialize, Serializer};

use crate::error::WorkflowError;

/// Label of the terminal sentinel when a graph is described.
pub const END: &str = "__end__";

/// Where an edge leads: another node, or the terminal sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
  Node(usize),
  End,
}

impl Serialize for Target {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Target::Node(index) => serializer.serialize_u64(*index as u64),
      Target::End => serializer.serialize_str(END),
    }
  }
}

/// A node in the step graph, bound to the capability that executes it.
#[derive(Clone)]
pub struct StepNode {
  index: usize,
  step: String,
  capability: Arc<dyn Capability>,
}

impl StepNode {
  /// Position of the node along the path.
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn step(&self) -> &str {
    &self.step
  }

  pub fn capability(&self) -> &Arc<dyn Capability> {
    &self.capability
  }
}

impl fmt::Debug for StepNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StepNode")
      .field("index", &self.index)
      .field("step", &self.step)
      .finish_non_exhaustive()
  }
}

/// A linear graph of steps.
///
/// Built fresh per pipeline invocation and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct StepGraph {
  nodes: Vec<StepNode>,
  /// Edge from each node to its successor, in path order.
  edges: Vec<(usize, Target)>,
}

impl StepGraph {
  /// Build a graph from an ordered list of step names.
  ///
  /// Every name is resolved before any node is created, so a failure never
  /// leaves a partial graph behind.
  pub fn build<S: AsRef<str>>(
    step_names: &[S],
    registry: &StepRegistry,
  ) -> Result<Self, WorkflowError> {
    if step_names.is_empty() {
      return Err(WorkflowError::EmptyWorkflow);
    }

    let capabilities = step_names
      .iter()
      .enumerate()
      .map(|(position, name)| {
        registry
          .resolve(name.as_ref())
          .map_err(|_| WorkflowError::UnknownStep {
            step: name.as_ref().to_string(),
            position,
          })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let nodes: Vec<StepNode> = step_names
      .iter()
      .zip(capabilities)
      .enumerate()
      .map(|(index, (name, capability))| StepNode {
        index,
        step: name.as_ref().to_string(),
        capability,
      })
      .collect();

    let last = nodes.len() - 1;
    let edges = (0..nodes.len())
      .map(|index| {
        let target = if index < last {
          Target::Node(index + 1)
        } else {
          Target::End
        };
        (index, target)
      })
      .collect();

    Ok(Self { nodes, edges })
  }

  /// The entry node. Always the first requested step.
  pub fn entry(&self) -> &StepNode {
    &self.nodes[0]
  }

  /// Where the edge out of `index` leads, if the node exists.
  pub fn successor(&self, index: usize) -> Option<Target> {
    self
      .edges
      .iter()
      .find(|(from, _)| *from == index)
      .map(|(_, to)| *to)
  }

  pub fn node(&self, index: usize) -> Option<&StepNode> {
    self.nodes.get(index)
  }

  pub fn nodes(&self) -> &[StepNode] {
    &self.nodes
  }

  pub fn edges(&self) -> &[(usize, Target)] {
    &self.edges
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// A built graph always has at least one node.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.nodes.iter().map(StepNode::step).collect()
  }

  /// Walk the path from `start` by following edges until the sentinel.
  pub fn path_from(&self, start: usize) -> PathIter<'_> {
    let next = if start < self.nodes.len() {
      Target::Node(start)
    } else {
      Target::End
    };
    PathIter { graph: self, next }
  }

  /// Serializable shape of the graph, without capabilities.
  pub fn describe(&self) -> GraphShape {
    GraphShape {
      entry: self.entry().index,
      nodes: self
        .nodes
        .iter()
        .map(|node| NodeShape {
          index: node.index,
          step: node.step.clone(),
        })
        .collect(),
      edges: self.edges.clone(),
    }
  }
}

/// Iterator over nodes along the path. See [`StepGraph::path_from`].
pub struct PathIter<'a> {
  graph: &'a StepGraph,
  next: Target,
}

impl<'a> Iterator for PathIter<'a> {
  type Item = &'a StepNode;

  fn next(&mut self) -> Option<Self::Item> {
    let Target::Node(index) = self.next else {
      return None;
    };
    let node = self.graph.node(index)?;
    self.next = self.graph.successor(index).unwrap_or(Target::End);
    Some(node)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeShape {
  pub index: usize,
  pub step: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphShape {
  pub entry: usize,
  pub nodes: Vec<NodeShape>,
  pub edges: Vec<(usize, Target)>,
}

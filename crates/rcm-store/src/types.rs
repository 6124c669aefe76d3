use std::fmt;

use chrono::{DateTime, Utc};
use rcm_capability::PipelineState;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identifies one pipeline invocation.
///
/// The thread id partitions checkpoints; it carries no meaning across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIdentity {
  pub workflow_id: String,
  pub thread_id: String,
}

impl RunIdentity {
  pub fn new(workflow_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      thread_id: thread_id.into(),
    }
  }

  /// A new thread for the given workflow id.
  pub fn fresh(workflow_id: impl Into<String>) -> Self {
    Self::new(workflow_id, uuid::Uuid::new_v4().to_string())
  }

  /// Both ids freshly generated.
  pub fn generate() -> Self {
    Self::fresh(uuid::Uuid::new_v4().to_string())
  }
}

impl fmt::Display for RunIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.workflow_id, self.thread_id)
  }
}

/// State saved after a node completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  /// Index of the last completed node.
  pub node_index: usize,
  /// Step name of that node, used to detect a mismatched graph on resume.
  pub step: String,
  pub state: PipelineState,
  pub saved_at: DateTime<Utc>,
}

/// Status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RunStatus {
  Started,
  InProgress,
  Completed,
  Failed,
}

/// A workflow run as recorded by the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkflowRun {
  pub workflow_id: String,
  pub thread_id: String,
  pub workflow_type: String,
  pub status: RunStatus,
  pub current_step: Option<String>,
  pub error_message: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
  /// A freshly started run.
  pub fn started(identity: &RunIdentity, workflow_type: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      workflow_id: identity.workflow_id.clone(),
      thread_id: identity.thread_id.clone(),
      workflow_type: workflow_type.into(),
      status: RunStatus::Started,
      current_step: None,
      error_message: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn identity(&self) -> RunIdentity {
    RunIdentity::new(&self.workflow_id, &self.thread_id)
  }
}

/// Partial update applied to a recorded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunUpdate {
  pub status: RunStatus,
  pub current_step: Option<String>,
  pub error_message: Option<String>,
}

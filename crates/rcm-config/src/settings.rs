use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SettingsError;
use crate::steps;

const DEFAULT_RUN_PATH: &str = "/run";

/// Where a step's agent service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEndpoint {
  /// Base URL of the agent service, e.g. "http://eligibility_agent:8000".
  pub base_url: String,

  /// Path of the run endpoint on that service.
  #[serde(default = "default_run_path")]
  pub path: String,
}

impl AgentEndpoint {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      path: default_run_path(),
    }
  }

  /// The full URL of the run endpoint.
  pub fn run_url(&self) -> Result<Url, url::ParseError> {
    Url::parse(&self.base_url)?.join(&self.path)
  }
}

fn default_run_path() -> String {
  DEFAULT_RUN_PATH.to_string()
}

/// Backing store for run checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CheckpointBackend {
  /// Process-lifetime, in-memory checkpoints.
  #[default]
  Memory,
  /// Durable checkpoints and workflow-run records in SQLite.
  Sqlite { database_url: String },
}

/// Settings for the pipeline process, loaded from a JSON file.
///
/// Every field has a default, so an empty object (or no file at all) yields
/// the standard deployment layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Agent endpoint per step name.
  pub agents: BTreeMap<String, AgentEndpoint>,

  /// Per-request timeout for agent calls. `None` waits indefinitely.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_timeout_ms: Option<u64>,

  pub checkpoint: CheckpointBackend,

  /// Directory where uploaded artifacts are stored.
  pub upload_dir: PathBuf,

  /// Cap on the `POST /run` request body. `None` accepts any size.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_upload_bytes: Option<usize>,

  /// Address the HTTP front door listens on.
  pub listen_addr: SocketAddr,
}

impl Default for Settings {
  fn default() -> Self {
    let agents = [
      (steps::ELIGIBILITY, "http://eligibility_agent:8000"),
      (steps::PRIOR_AUTH, "http://prior_auth_agent:8001"),
      (steps::CLINICAL_DOC, "http://clinical_doc_agent:8002"),
      (steps::MEDICAL_CODING, "http://medical_coding_agent:8003"),
      (steps::CLAIM_SCRUBBING, "http://claim_scrubbing_agent:8004"),
      (steps::CLAIM_SUBMISSION, "http://claim_submission_agent:8005"),
    ]
    .into_iter()
    .map(|(step, url)| (step.to_string(), AgentEndpoint::new(url)))
    .collect();

    Self {
      agents,
      request_timeout_ms: None,
      checkpoint: CheckpointBackend::Memory,
      upload_dir: PathBuf::from("/uploads"),
      max_upload_bytes: None,
      listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
    }
  }
}

impl Settings {
  /// Load settings from a JSON file and validate them.
  pub fn load(path: &Path) -> Result<Self, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
      path: path.display().to_string(),
      source,
    })?;

    let settings: Settings =
      serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.display().to_string(),
        source,
      })?;

    settings.validate()?;
    Ok(settings)
  }

  /// Check that every endpoint names a known step and has a usable URL.
  pub fn validate(&self) -> Result<(), SettingsError> {
    for (step, endpoint) in &self.agents {
      if !steps::is_known(step) {
        return Err(SettingsError::UnknownStep(step.clone()));
      }
      endpoint
        .run_url()
        .map_err(|e| SettingsError::InvalidEndpoint {
          step: step.clone(),
          message: e.to_string(),
        })?;
    }
    Ok(())
  }
}

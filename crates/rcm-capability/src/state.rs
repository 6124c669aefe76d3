//! Pipeline State, the document threaded through every step of a run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Recognized state keys.
///
/// Step outputs live under their step name (see `rcm_config::steps`).
pub mod keys {
  pub const WORKFLOW_TYPE: &str = "workflow_type";
  pub const FILE_PATH: &str = "file_path";
  pub const SUCCESS: &str = "success";
  pub const ERROR_MESSAGE: &str = "error_message";
  pub const RETRY_COUNT: &str = "retry_count";
  pub const SOURCE: &str = "source";
}

/// An open-ended key-value document carried through a pipeline run.
///
/// The state only grows: keys can be added or overwritten but never
/// removed, so every step sees the outputs of all steps before it.
/// Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineState(Map<String, Value>);

impl PipelineState {
  /// Create the initial state for a run of the given workflow type.
  pub fn new(workflow_type: impl Into<String>) -> Self {
    let mut state = Self::default();
    state.insert(keys::WORKFLOW_TYPE, Value::String(workflow_type.into()));
    state.insert(keys::SUCCESS, Value::Bool(true));
    state.insert(keys::RETRY_COUNT, Value::from(0u64));
    state
  }

  pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
    self.insert(keys::FILE_PATH, Value::String(file_path.into()));
    self
  }

  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.insert(keys::SOURCE, Value::String(source.into()));
    self
  }

  pub fn workflow_type(&self) -> Option<&str> {
    self.get_str(keys::WORKFLOW_TYPE)
  }

  pub fn file_path(&self) -> Option<&str> {
    self.get_str(keys::FILE_PATH)
  }

  /// Whether the run is still considered successful. A missing key reads as
  /// `false`.
  pub fn success(&self) -> bool {
    self
      .0
      .get(keys::SUCCESS)
      .and_then(Value::as_bool)
      .unwrap_or(false)
  }

  pub fn error_message(&self) -> Option<&str> {
    self.get_str(keys::ERROR_MESSAGE)
  }

  pub fn retry_count(&self) -> u64 {
    self
      .0
      .get(keys::RETRY_COUNT)
      .and_then(Value::as_u64)
      .unwrap_or(0)
  }

  pub fn source(&self) -> Option<&str> {
    self.get_str(keys::SOURCE)
  }

  /// Flag a soft failure: the run continues, but `success` reads false.
  pub fn mark_failed(&mut self, message: impl Into<String>) {
    self.insert(keys::SUCCESS, Value::Bool(false));
    self.insert(keys::ERROR_MESSAGE, Value::String(message.into()));
  }

  /// Output recorded by a step, if it has run.
  pub fn step_output(&self, step: &str) -> Option<&Value> {
    self.0.get(step)
  }

  /// Record a step's output under the step name.
  pub fn set_step_output(&mut self, step: &str, output: Value) -> Option<Value> {
    self.insert(step, output)
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  /// Set a key, returning the previous value if it was overwritten.
  pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
    self.0.insert(key.into(), value)
  }

  /// Merge another set of entries into this state. Existing keys are
  /// overwritten, nothing is removed.
  pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
    for (key, value) in entries {
      self.0.insert(key, value);
    }
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn into_value(self) -> Value {
    Value::Object(self.0)
  }

  fn get_str(&self, key: &str) -> Option<&str> {
    self.0.get(key).and_then(Value::as_str)
  }
}

impl From<Map<String, Value>> for PipelineState {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}

impl IntoIterator for PipelineState {
  type Item = (String, Value);
  type IntoIter = serde_json::map::IntoIter;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}

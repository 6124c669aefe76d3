use thiserror::Error;

/// A capability failed during its own invocation.
#[derive(Debug, Error)]
pub enum CapabilityError {
  /// The agent could not be reached or the connection broke mid-request.
  #[error("request to '{url}' failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The agent answered with a non-success status.
  #[error("agent at '{url}' responded with status {status}: {body}")]
  Status { url: String, status: u16, body: String },

  /// The agent answered, but not with something we can store.
  #[error("invalid response from '{url}': {message}")]
  InvalidResponse { url: String, message: String },

  /// Failure raised by an in-process capability.
  #[error("{0}")]
  Failed(String),
}

impl CapabilityError {
  pub fn failed(message: impl Into<String>) -> Self {
    CapabilityError::Failed(message.into())
  }
}

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("unknown step: {0}")]
  UnknownStep(String),

  #[error("step already registered: {0}")]
  DuplicateStep(String),

  #[error("invalid endpoint for step '{step}': {message}")]
  InvalidEndpoint { step: String, message: String },

  #[error("failed to build http client: {0}")]
  Client(#[source] reqwest::Error),
}

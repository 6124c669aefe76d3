use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("failed to read settings file '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse settings file '{path}': {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("endpoint configured for unknown step: {0}")]
  UnknownStep(String),

  #[error("invalid endpoint for step '{step}': {message}")]
  InvalidEndpoint { step: String, message: String },
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rcm_config::Settings;
use reqwest::Client;

use crate::capability::Capability;
use crate::error::RegistryError;
use crate::http::HttpCapability;

/// Maps step names to the capabilities that execute them.
///
/// Built once per process and shared read-only between runs.
#[derive(Clone, Default)]
pub struct StepRegistry {
  capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl StepRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a registry with one [`HttpCapability`] per configured agent.
  pub fn from_settings(settings: &Settings) -> Result<Self, RegistryError> {
    let mut builder = Client::builder();
    if let Some(timeout_ms) = settings.request_timeout_ms {
      builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    let client = builder.build().map_err(RegistryError::Client)?;

    let mut registry = Self::new();
    for (step, endpoint) in &settings.agents {
      let url = endpoint
        .run_url()
        .map_err(|e| RegistryError::InvalidEndpoint {
          step: step.clone(),
          message: e.to_string(),
        })?;
      registry.register(step.clone(), Arc::new(HttpCapability::new(client.clone(), url)))?;
    }
    Ok(registry)
  }

  /// Bind a step name to a capability. Names must be unique.
  pub fn register(
    &mut self,
    step: impl Into<String>,
    capability: Arc<dyn Capability>,
  ) -> Result<(), RegistryError> {
    let step = step.into();
    if self.capabilities.contains_key(&step) {
      return Err(RegistryError::DuplicateStep(step));
    }
    self.capabilities.insert(step, capability);
    Ok(())
  }

  /// Builder-style [`register`](Self::register).
  pub fn with(
    mut self,
    step: impl Into<String>,
    capability: Arc<dyn Capability>,
  ) -> Result<Self, RegistryError> {
    self.register(step, capability)?;
    Ok(self)
  }

  /// Look up the capability bound to a step name.
  pub fn resolve(&self, step: &str) -> Result<Arc<dyn Capability>, RegistryError> {
    self
      .capabilities
      .get(step)
      .cloned()
      .ok_or_else(|| RegistryError::UnknownStep(step.to_string()))
  }

  pub fn contains(&self, step: &str) -> bool {
    self.capabilities.contains_key(step)
  }

  /// Registered step names, sorted.
  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.capabilities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.capabilities.is_empty()
  }
}

impl fmt::Debug for StepRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StepRegistry")
      .field("steps", &self.names())
      .finish()
  }
}

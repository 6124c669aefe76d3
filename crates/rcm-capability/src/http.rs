//! Capability backed by a remote agent service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::capability::{Capability, StepContext};
use crate::error::CapabilityError;
use crate::state::PipelineState;

/// Body posted to an agent's run endpoint.
#[derive(Debug, Serialize)]
struct AgentRunRequest<'a> {
  workflow_type: &'a str,
  file_path: Option<&'a str>,
  workflow_id: &'a str,
  thread_id: &'a str,
}

/// Forwards a step to an agent service over HTTP.
///
/// The agent receives the run identity and the request fields it needs, and
/// its JSON reply is stored in the state under the step name.
#[derive(Debug, Clone)]
pub struct HttpCapability {
  client: Client,
  url: Url,
}

impl HttpCapability {
  pub fn new(client: Client, url: Url) -> Self {
    Self { client, url }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}

#[async_trait]
impl Capability for HttpCapability {
  async fn invoke(
    &self,
    mut state: PipelineState,
    ctx: &StepContext,
  ) -> Result<PipelineState, CapabilityError> {
    let url = self.url.to_string();

    let request = {
      let body = AgentRunRequest {
        workflow_type: state.workflow_type().unwrap_or_default(),
        file_path: state.file_path(),
        workflow_id: &ctx.workflow_id,
        thread_id: &ctx.thread_id,
      };
      self.client.post(self.url.clone()).json(&body)
    };

    debug!(step = %ctx.step, url = %url, "calling agent");

    let response = request
      .send()
      .await
      .map_err(|source| CapabilityError::Transport {
        url: url.clone(),
        source,
      })?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|source| CapabilityError::Transport {
        url: url.clone(),
        source,
      })?;

    if !status.is_success() {
      return Err(CapabilityError::Status {
        url,
        status: status.as_u16(),
        body,
      });
    }

    let output: serde_json::Value =
      serde_json::from_str(&body).map_err(|e| CapabilityError::InvalidResponse {
        url: url.clone(),
        message: e.to_string(),
      })?;

    debug!(step = %ctx.step, url = %url, status = status.as_u16(), "agent responded");

    state.set_step_output(&ctx.step, output);
    Ok(state)
  }
}

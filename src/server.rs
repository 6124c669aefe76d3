//! HTTP front door for the pipeline.

use std::path::{Path, PathBuf};

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rcm_capability::PipelineState;
use rcm_config::WorkflowType;
use rcm_orchestrator::{Orchestrator, PipelineError, PipelineRequest};
use rcm_runtime::ExecutionError;
use rcm_store::RunIdentity;
use rcm_workflow::WorkflowError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Orchestrator,
  pub upload_dir: PathBuf,
  /// `None` lifts axum's default 2 MiB body cap entirely.
  pub max_upload_bytes: Option<usize>,
}

pub fn router(state: AppState) -> Router {
  let body_limit = match state.max_upload_bytes {
    Some(limit) => DefaultBodyLimit::max(limit),
    None => DefaultBodyLimit::disable(),
  };

  Router::new()
    .route("/run", post(run_handler))
    .route("/presets", get(presets_handler))
    .route("/health", get(|| async { "OK" }))
    .layer(body_limit)
    .with_state(state)
}

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("invalid multipart body: {0}")]
  Multipart(#[from] MultipartError),

  #[error("failed to store upload: {0}")]
  Upload(#[from] std::io::Error),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

#[derive(Serialize)]
struct ErrorResponse {
  error: String,
  message: String,
  status_code: u16,
}

impl ServerError {
  fn status(&self) -> StatusCode {
    match self {
      ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ServerError::Multipart(e) => e.status(),
      ServerError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ServerError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
      ServerError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      ServerError::BadRequest(_) => "bad_request",
      ServerError::Multipart(_) => "invalid_multipart",
      ServerError::Upload(_) => "upload_failed",
      ServerError::Pipeline(PipelineError::InvalidWorkflowType { .. }) => "invalid_workflow_type",
      ServerError::Pipeline(PipelineError::Workflow(WorkflowError::UnknownStep { .. })) => {
        "unknown_step"
      }
      ServerError::Pipeline(PipelineError::Workflow(_)) => "invalid_workflow",
      ServerError::Pipeline(PipelineError::Execution(ExecutionError::Capability { .. })) => {
        "capability_failed"
      }
      ServerError::Pipeline(PipelineError::Execution(_)) => "execution_failed",
    }
  }
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request_failed");
    } else {
      warn!(error = %self, "request_rejected");
    }

    let body = Json(ErrorResponse {
      error: self.kind().to_string(),
      message: self.to_string(),
      status_code: status.as_u16(),
    });
    (status, body).into_response()
  }
}

#[derive(Serialize)]
struct RunResponse {
  message: &'static str,
  workflow_id: String,
  thread_id: String,
  final_state: PipelineState,
}

async fn run_handler(
  State(state): State<AppState>,
  mut multipart: Multipart,
) -> Result<Json<RunResponse>, ServerError> {
  let identity = RunIdentity::generate();
  let mut workflow_type = None;
  let mut steps = Vec::new();
  let mut file_path = None;
  let mut source = None;

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().map(str::to_string);
    match name.as_deref() {
      Some("workflow_type") => workflow_type = Some(field.text().await?),
      Some("step") => steps.push(field.text().await?),
      Some("source") => source = Some(field.text().await?),
      Some("file") => {
        let Some(file_name) = field.file_name().and_then(upload_name) else {
          return Err(ServerError::BadRequest(
            "file field has no usable file name".to_string(),
          ));
        };
        let bytes = field.bytes().await?;
        let stored_name = format!("{}_{}", identity.thread_id, file_name);
        let path = store_upload(&state.upload_dir, &stored_name, &bytes).await?;
        file_path = Some(path.display().to_string());
      }
      _ => {}
    }
  }

  let workflow_type = workflow_type
    .ok_or_else(|| ServerError::BadRequest("missing workflow_type field".to_string()))?;

  let request = PipelineRequest {
    workflow_type,
    steps: (!steps.is_empty()).then_some(steps),
    file_path,
    source,
  };
  let outcome = state
    .orchestrator
    .run_with_identity(identity, request)
    .await?;

  info!(
    workflow_id = %outcome.identity.workflow_id,
    thread_id = %outcome.identity.thread_id,
    "run_request_completed"
  );
  Ok(Json(RunResponse {
    message: "Run successfully",
    workflow_id: outcome.identity.workflow_id,
    thread_id: outcome.identity.thread_id,
    final_state: outcome.final_state,
  }))
}

#[derive(Serialize)]
struct PresetEntry {
  workflow_type: &'static str,
  steps: &'static [&'static str],
}

async fn presets_handler() -> Json<Vec<PresetEntry>> {
  Json(
    WorkflowType::ALL
      .iter()
      .map(|preset| PresetEntry {
        workflow_type: preset.as_str(),
        steps: preset.steps(),
      })
      .collect(),
  )
}

/// Final path component of a client-supplied file name.
fn upload_name(name: &str) -> Option<String> {
  Path::new(name)
    .file_name()
    .and_then(|name| name.to_str())
    .map(str::to_string)
}

async fn store_upload(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
  tokio::fs::create_dir_all(dir).await?;
  let path = dir.join(name);
  tokio::fs::write(&path, bytes).await?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use axum::body::Body;
  use axum::http::Request;
  use rcm_capability::{Capability, CapabilityError, FnCapability, StepRegistry};
  use rcm_config::steps;
  use rcm_runtime::WorkflowExecutor;
  use serde_json::{Value, json};
  use tower::ServiceExt;

  const BOUNDARY: &str = "rcm-test-boundary";

  fn test_router(upload_dir: &Path) -> Router {
    limited_router(upload_dir, None)
  }

  /// Every step records the file path it saw; `claim_submission` fails.
  fn limited_router(upload_dir: &Path, max_upload_bytes: Option<usize>) -> Router {
    let mut registry = StepRegistry::new();
    for step in steps::ALL_STEPS {
      let capability: Arc<dyn Capability> = if step == steps::CLAIM_SUBMISSION {
        Arc::new(FnCapability::new(|_state, _ctx| {
          Err(CapabilityError::failed("clearinghouse unavailable"))
        }))
      } else {
        Arc::new(FnCapability::new(|mut state, ctx| {
          let seen = state.file_path().map(str::to_string);
          state.set_step_output(&ctx.step, json!({ "file_path": seen }));
          Ok(state)
        }))
      };
      registry.register(step, capability).unwrap();
    }

    router(AppState {
      orchestrator: Orchestrator::new(Arc::new(registry), WorkflowExecutor::in_memory()),
      upload_dir: upload_dir.to_path_buf(),
      max_upload_bytes,
    })
  }

  fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str)>) -> String {
    let mut body = String::new();
    for (name, value) in fields {
      body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
      ));
    }
    if let Some((file_name, content)) = file {
      body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
      ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
  }

  async fn post_run(router: Router, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
      .method("POST")
      .uri("/run")
      .header(
        "content-type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
      )
      .body(Body::from(body))
      .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn test_run_with_upload() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
      &[("workflow_type", "eligibility_only")],
      Some(("chart.txt", "member 123")),
    );

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Run successfully");
    assert!(json["workflow_id"].as_str().is_some());
    assert!(json["thread_id"].as_str().is_some());

    let thread_id = json["thread_id"].as_str().unwrap();
    let saved = dir.path().join(format!("{thread_id}_chart.txt"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "member 123");

    let state = &json["final_state"];
    assert_eq!(state["workflow_type"], "eligibility_only");
    assert_eq!(state["success"], true);
    assert_eq!(state["retry_count"], 0);
    assert_eq!(state["file_path"], saved.display().to_string());
    assert_eq!(
      state["eligibility"]["file_path"],
      saved.display().to_string()
    );
  }

  #[tokio::test]
  async fn test_upload_name_is_reduced_to_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
      &[("workflow_type", "eligibility_only")],
      Some(("../../etc/chart.txt", "x")),
    );

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::OK);
    let thread_id = json["thread_id"].as_str().unwrap();
    assert_eq!(
      json["final_state"]["file_path"],
      dir
        .path()
        .join(format!("{thread_id}_chart.txt"))
        .display()
        .to_string()
    );
  }

  #[tokio::test]
  async fn test_same_name_uploads_keep_their_own_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path());
    let first = multipart_body(
      &[("workflow_type", "eligibility_only")],
      Some(("chart.txt", "member 111")),
    );
    let second = multipart_body(
      &[("workflow_type", "eligibility_only")],
      Some(("chart.txt", "member 222")),
    );

    let ((first_status, first), (second_status, second)) = tokio::join!(
      post_run(router.clone(), first),
      post_run(router, second),
    );

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    let first_path = first["final_state"]["file_path"].as_str().unwrap();
    let second_path = second["final_state"]["file_path"].as_str().unwrap();
    assert_ne!(first_path, second_path);
    assert_eq!(std::fs::read_to_string(first_path).unwrap(), "member 111");
    assert_eq!(std::fs::read_to_string(second_path).unwrap(), "member 222");
  }

  #[tokio::test]
  async fn test_upload_larger_than_axum_default_limit() {
    let dir = tempfile::tempdir().unwrap();
    let content = "a".repeat(3 * 1024 * 1024);
    let body = multipart_body(
      &[("workflow_type", "eligibility_only")],
      Some(("scan.txt", content.as_str())),
    );

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::OK);
    let saved = json["final_state"]["file_path"].as_str().unwrap();
    assert_eq!(std::fs::metadata(saved).unwrap().len(), content.len() as u64);
  }

  #[tokio::test]
  async fn test_upload_over_configured_limit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let content = "a".repeat(4096);
    let body = multipart_body(
      &[("workflow_type", "eligibility_only")],
      Some(("scan.txt", content.as_str())),
    );

    let (status, json) = post_run(limited_router(dir.path(), Some(1024)), body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"], "invalid_multipart");
    assert_eq!(json["status_code"], 413);
  }

  #[tokio::test]
  async fn test_run_with_step_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(
      &[
        ("workflow_type", "full"),
        ("step", "prior_auth"),
        ("step", "clinical_doc"),
      ],
      None,
    );

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::OK);
    let state = &json["final_state"];
    assert!(state.get("prior_auth").is_some());
    assert!(state.get("clinical_doc").is_some());
    assert!(state.get("eligibility").is_none());
    assert!(state["file_path"].is_null());
  }

  #[tokio::test]
  async fn test_unknown_workflow_type_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[("workflow_type", "partial")], None);

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_workflow_type");
    assert_eq!(json["status_code"], 400);
    assert!(json["message"].as_str().unwrap().contains("partial"));
  }

  #[tokio::test]
  async fn test_unknown_step_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[("workflow_type", "full"), ("step", "denials")], None);

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unknown_step");
  }

  #[tokio::test]
  async fn test_missing_workflow_type_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[("source", "portal")], None);

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
  }

  #[tokio::test]
  async fn test_capability_failure_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let body = multipart_body(&[("workflow_type", "full")], None);

    let (status, json) = post_run(test_router(dir.path()), body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "capability_failed");
    assert_eq!(json["status_code"], 500);
    assert!(
      json["message"]
        .as_str()
        .unwrap()
        .contains("clearinghouse unavailable")
    );
  }

  #[tokio::test]
  async fn test_presets_and_health() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(dir.path());

    let response = router
      .clone()
      .oneshot(
        Request::builder()
          .uri("/presets")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let presets: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(presets.as_array().unwrap().len(), WorkflowType::ALL.len());
    assert_eq!(presets[0]["workflow_type"], "eligibility_only");
    assert_eq!(presets[0]["steps"], json!(["eligibility"]));

    let response = router
      .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }
}

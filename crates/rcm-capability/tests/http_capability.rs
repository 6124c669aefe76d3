//! HttpCapability against a throwaway agent server.

use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use rcm_capability::{Capability, CapabilityError, HttpCapability, PipelineState, StepContext};
use serde_json::{Value, json};
use url::Url;

/// Start an agent server on an ephemeral port and return its address.
async fn spawn_agent() -> SocketAddr {
  let app = Router::new()
    .route(
      "/run",
      post(|Json(body): Json<Value>| async move {
        Json(json!({
          "message": "Run successfully",
          "received": body,
        }))
      }),
    )
    .route(
      "/fail",
      post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "agent exploded") }),
    )
    .route("/text", post(|| async { "definitely not json" }));

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
    .await
    .expect("failed to bind");
  let addr = listener.local_addr().expect("no local addr");
  tokio::spawn(async move {
    axum::serve(listener, app).await.expect("server failed");
  });
  addr
}

fn capability(addr: SocketAddr, path: &str) -> HttpCapability {
  let url = Url::parse(&format!("http://{}{}", addr, path)).unwrap();
  HttpCapability::new(reqwest::Client::new(), url)
}

fn context() -> StepContext {
  StepContext {
    step: "eligibility".to_string(),
    node_index: 0,
    workflow_id: "wf-1".to_string(),
    thread_id: "thread-1".to_string(),
  }
}

#[tokio::test]
async fn test_stores_reply_under_step_name() {
  let addr = spawn_agent().await;
  let state = PipelineState::new("eligibility_only").with_file_path("/uploads/card.png");

  let result = capability(addr, "/run")
    .invoke(state, &context())
    .await
    .expect("invoke failed");

  let output = result.step_output("eligibility").expect("no output");
  assert_eq!(output["message"], "Run successfully");
  assert_eq!(
    output["received"],
    json!({
      "workflow_type": "eligibility_only",
      "file_path": "/uploads/card.png",
      "workflow_id": "wf-1",
      "thread_id": "thread-1",
    })
  );

  // Earlier keys survive
  assert_eq!(result.workflow_type(), Some("eligibility_only"));
  assert!(result.success());
}

#[tokio::test]
async fn test_missing_file_path_sent_as_null() {
  let addr = spawn_agent().await;

  let result = capability(addr, "/run")
    .invoke(PipelineState::new("full"), &context())
    .await
    .expect("invoke failed");

  let output = result.step_output("eligibility").unwrap();
  assert_eq!(output["received"]["file_path"], Value::Null);
}

#[tokio::test]
async fn test_error_status_is_failure() {
  let addr = spawn_agent().await;

  let err = capability(addr, "/fail")
    .invoke(PipelineState::new("full"), &context())
    .await
    .unwrap_err();

  match err {
    CapabilityError::Status { status, body, .. } => {
      assert_eq!(status, 500);
      assert_eq!(body, "agent exploded");
    }
    other => panic!("unexpected error: {}", other),
  }
}

#[tokio::test]
async fn test_non_json_reply_is_failure() {
  let addr = spawn_agent().await;

  let err = capability(addr, "/text")
    .invoke(PipelineState::new("full"), &context())
    .await
    .unwrap_err();

  assert!(matches!(err, CapabilityError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_unreachable_agent_is_transport_failure() {
  // Bind and immediately drop to get a port nobody listens on
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let err = capability(addr, "/run")
    .invoke(PipelineState::new("full"), &context())
    .await
    .unwrap_err();

  assert!(matches!(err, CapabilityError::Transport { .. }));
}

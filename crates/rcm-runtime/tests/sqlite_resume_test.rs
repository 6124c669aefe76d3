//! Executors sharing one SQLite database file.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rcm_capability::{Capability, CapabilityError, FnCapability, PipelineState, StepRegistry};
use rcm_runtime::{ExecutionError, ExecutionEvent, RunRecorder, WorkflowExecutor};
use rcm_store::{CheckpointStore, RunIdentity, RunStatus, RunStore, SqliteStore};
use rcm_workflow::StepGraph;
use serde_json::json;
use tokio::task::JoinHandle;

async fn open_store(path: &Path) -> Arc<SqliteStore> {
  let url = format!("sqlite://{}", path.display());
  Arc::new(SqliteStore::connect(&url).await.unwrap())
}

/// An executor over `store` whose events are recorded back into it.
fn recording_executor(store: &Arc<SqliteStore>) -> (WorkflowExecutor, JoinHandle<()>) {
  let (recorder, notifier) = RunRecorder::new(store.clone());
  let handle = tokio::spawn(recorder.run());
  let executor = WorkflowExecutor::new(store.clone()).with_notifier(Arc::new(notifier));
  (executor, handle)
}

#[tokio::test]
async fn test_second_executor_resumes_run_failed_on_first() {
  let dir = tempfile::tempdir().unwrap();
  let db_path = dir.path().join("rcm.db");

  let eligibility_calls = Arc::new(AtomicUsize::new(0));
  let prior_auth_calls = Arc::new(AtomicUsize::new(0));
  let eligibility: Arc<dyn Capability> = {
    let calls = eligibility_calls.clone();
    Arc::new(FnCapability::new(move |mut state, ctx| {
      calls.fetch_add(1, Ordering::SeqCst);
      state.set_step_output(&ctx.step, json!({ "status": "Eligible" }));
      Ok(state)
    }))
  };
  let prior_auth: Arc<dyn Capability> = {
    let calls = prior_auth_calls.clone();
    Arc::new(FnCapability::new(move |mut state, ctx| {
      if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return Err(CapabilityError::failed("payer portal timed out"));
      }
      state.set_step_output(&ctx.step, json!({ "approved": true }));
      Ok(state)
    }))
  };
  let registry = StepRegistry::new()
    .with("eligibility", eligibility)
    .unwrap()
    .with("prior_auth", prior_auth)
    .unwrap();
  let graph = StepGraph::build(&["eligibility", "prior_auth"], &registry).unwrap();
  let identity = RunIdentity::generate();

  // First process: fails on prior_auth after checkpointing eligibility
  let first_store = open_store(&db_path).await;
  let (first, first_recorder) = recording_executor(&first_store);
  let result = first
    .run(&graph, PipelineState::new("pre_auth"), &identity)
    .await;
  assert!(matches!(result, Err(ExecutionError::Capability { .. })));
  drop(first);
  first_recorder.await.unwrap();

  let run = first_store.get_run(&identity).await.unwrap();
  assert_eq!(run.status, RunStatus::Failed);
  assert_eq!(run.current_step.as_deref(), Some("prior_auth"));

  // Second process: a separate pool on the same file picks the run up
  let second_store = open_store(&db_path).await;
  let checkpoint = second_store.load(&identity).await.unwrap().unwrap();
  assert_eq!(checkpoint.node_index, 0);
  assert_eq!(checkpoint.step, "eligibility");

  let (second, second_recorder) = recording_executor(&second_store);
  let final_state = second
    .run(&graph, PipelineState::new("pre_auth"), &identity)
    .await
    .unwrap();
  drop(second);
  second_recorder.await.unwrap();

  assert_eq!(eligibility_calls.load(Ordering::SeqCst), 1);
  assert_eq!(prior_auth_calls.load(Ordering::SeqCst), 2);
  assert_eq!(
    final_state.step_output("eligibility"),
    Some(&json!({ "status": "Eligible" }))
  );
  assert_eq!(
    final_state.step_output("prior_auth"),
    Some(&json!({ "approved": true }))
  );

  let run = second_store.get_run(&identity).await.unwrap();
  assert_eq!(run.status, RunStatus::Completed);
  assert!(run.error_message.is_none());
  assert_eq!(second_store.list_runs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_restarting_recorded_identity_updates_its_row() {
  let dir = tempfile::tempdir().unwrap();
  let store = open_store(&dir.path().join("rcm.db")).await;
  let (mut recorder, _notifier) = RunRecorder::new(store.clone());
  let identity = RunIdentity::new("wf-restart", "thread-restart");

  let started = ExecutionEvent::WorkflowStarted {
    identity: identity.clone(),
    workflow_type: Some("full".to_string()),
    steps: vec!["eligibility".to_string()],
  };
  recorder.record(&started).await.unwrap();
  recorder
    .record(&ExecutionEvent::WorkflowFailed {
      identity: identity.clone(),
      error: "agent unreachable".to_string(),
    })
    .await
    .unwrap();

  // No checkpoint survives, so the next run starts from scratch
  recorder.record(&started).await.unwrap();

  let run = store.get_run(&identity).await.unwrap();
  assert_eq!(run.status, RunStatus::Started);
  assert!(run.error_message.is_none());
  assert_eq!(store.list_runs().await.unwrap().len(), 1);
}

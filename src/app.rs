use std::sync::Arc;

use anyhow::{Context, Result};
use rcm_capability::StepRegistry;
use rcm_config::{CheckpointBackend, Settings};
use rcm_orchestrator::Orchestrator;
use rcm_runtime::{RunRecorder, WorkflowExecutor};
use rcm_store::{RunStore, SqliteStore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything a command needs, wired from settings.
pub struct App {
  pub settings: Settings,
  pub orchestrator: Orchestrator,
  /// Present only with a durable backend.
  pub runs: Option<Arc<dyn RunStore>>,
  recorder: Option<JoinHandle<()>>,
}

impl App {
  pub async fn build(settings: Settings) -> Result<Self> {
    let registry =
      StepRegistry::from_settings(&settings).context("failed to build step registry")?;
    debug!(steps = ?registry.names(), "step_registry_built");

    let (executor, runs, recorder) = match &settings.checkpoint {
      CheckpointBackend::Memory => (WorkflowExecutor::in_memory(), None, None),
      CheckpointBackend::Sqlite { database_url } => {
        let store = Arc::new(
          SqliteStore::connect(database_url)
            .await
            .with_context(|| format!("failed to open checkpoint database: {database_url}"))?,
        );
        info!(database_url = %database_url, "sqlite_store_opened");

        let runs: Arc<dyn RunStore> = store.clone();
        let (recorder, notifier) = RunRecorder::new(runs.clone());
        let handle = tokio::spawn(recorder.run());
        let executor = WorkflowExecutor::new(store).with_notifier(Arc::new(notifier));
        (executor, Some(runs), Some(handle))
      }
    };

    Ok(Self {
      orchestrator: Orchestrator::new(Arc::new(registry), executor),
      settings,
      runs,
      recorder,
    })
  }

  /// Drop the executor and wait for pending run records to be written.
  pub async fn shutdown(self) {
    let Self {
      orchestrator,
      recorder,
      ..
    } = self;
    drop(orchestrator);

    if let Some(handle) = recorder {
      if let Err(e) = handle.await {
        warn!(error = %e, "run_recorder_join_failed");
      }
    }
  }
}

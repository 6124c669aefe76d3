use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rcm_config::{Settings, WorkflowType};
use rcm_orchestrator::PipelineRequest;
use rcm_store::RunIdentity;

mod app;
mod server;

use app::App;

/// RCM - revenue-cycle-management pipeline orchestrator
#[derive(Parser)]
#[command(name = "rcm")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the settings file (default: <data-dir>/settings.json when present)
  #[arg(long, global = true, env = "RCM_SETTINGS")]
  settings: Option<PathBuf>,

  /// Path to the data directory (default: ~/.rcm)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline and print its final state
  Run {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Path to the artifact consumed by the eligibility step
    #[arg(long)]
    file: Option<PathBuf>,

    /// Free-form provenance tag recorded in the state
    #[arg(long)]
    source: Option<String>,
  },

  /// Re-invoke a run from its last checkpoint
  Resume {
    #[command(flatten)]
    pipeline: PipelineArgs,

    #[arg(long)]
    workflow_id: String,

    #[arg(long)]
    thread_id: String,
  },

  /// Print the step graph a pipeline would run
  Plan {
    #[command(flatten)]
    pipeline: PipelineArgs,
  },

  /// List workflow presets and their steps
  Presets,

  /// List recorded workflow runs (sqlite backend only)
  Runs,

  /// Serve the HTTP front door
  Serve {
    /// Listen address (overrides settings)
    #[arg(long)]
    listen: Option<SocketAddr>,
  },
}

#[derive(Args)]
struct PipelineArgs {
  /// Workflow preset, e.g. eligibility_only or full
  #[arg(long)]
  workflow_type: String,

  /// Explicit step, repeatable. Replaces the preset's step list.
  #[arg(long = "step")]
  steps: Vec<String>,
}

impl PipelineArgs {
  fn into_request(self) -> PipelineRequest {
    let request = PipelineRequest::new(self.workflow_type);
    if self.steps.is_empty() {
      request
    } else {
      request.with_steps(self.steps)
    }
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".rcm"),
  };

  let Some(command) = cli.command else {
    println!("rcm - use --help to see available commands");
    return Ok(());
  };

  if let Commands::Presets = command {
    return print_presets();
  }

  let settings = load_settings(cli.settings.as_deref(), &data_dir)?;

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let app = App::build(settings).await?;
    let result = run_command(&app, command).await;
    app.shutdown().await;
    result
  })
}

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .try_init();
}

fn load_settings(explicit: Option<&Path>, data_dir: &Path) -> Result<Settings> {
  let path = match explicit {
    Some(path) => path.to_path_buf(),
    None => {
      let default = data_dir.join("settings.json");
      if !default.exists() {
        info!("no settings file found, using defaults");
        return Ok(Settings::default());
      }
      default
    }
  };

  let settings = Settings::load(&path)
    .with_context(|| format!("failed to load settings: {}", path.display()))?;
  info!(path = %path.display(), "settings_loaded");
  Ok(settings)
}

async fn run_command(app: &App, command: Commands) -> Result<()> {
  match command {
    Commands::Run {
      pipeline,
      file,
      source,
    } => {
      let mut request = pipeline.into_request();
      if let Some(file) = file {
        request = request.with_file_path(file.display().to_string());
      }
      if let Some(source) = source {
        request = request.with_source(source);
      }

      let outcome = app
        .orchestrator
        .run_pipeline(request)
        .await
        .context("pipeline run failed")?;

      eprintln!("Run completed: {}", outcome.identity);
      println!("{}", serde_json::to_string_pretty(&outcome.final_state)?);
    }

    Commands::Resume {
      pipeline,
      workflow_id,
      thread_id,
    } => {
      let identity = RunIdentity::new(workflow_id, thread_id);
      let outcome = app
        .orchestrator
        .resume(identity, pipeline.into_request())
        .await
        .context("pipeline resume failed")?;

      eprintln!("Run completed: {}", outcome.identity);
      println!("{}", serde_json::to_string_pretty(&outcome.final_state)?);
    }

    Commands::Plan { pipeline } => {
      let shape = app
        .orchestrator
        .plan(&pipeline.into_request())
        .context("failed to plan pipeline")?;
      println!("{}", serde_json::to_string_pretty(&shape)?);
    }

    Commands::Runs => {
      let Some(runs) = &app.runs else {
        bail!("run records require the sqlite checkpoint backend");
      };
      let runs = runs.list_runs().await.context("failed to list runs")?;
      println!("{}", serde_json::to_string_pretty(&runs)?);
    }

    Commands::Serve { listen } => {
      let addr = listen.unwrap_or(app.settings.listen_addr);
      let state = server::AppState {
        orchestrator: app.orchestrator.clone(),
        upload_dir: app.settings.upload_dir.clone(),
        max_upload_bytes: app.settings.max_upload_bytes,
      };

      let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
      info!(addr = %addr, "server_listening");

      axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
      info!("server_stopped");
    }

    Commands::Presets => print_presets()?,
  }

  Ok(())
}

fn print_presets() -> Result<()> {
  for preset in WorkflowType::ALL {
    println!("{:<24} {}", preset.as_str(), preset.steps().join(" -> "));
  }
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_err() {
    // No signal handler; serve until killed
    std::future::pending::<()>().await;
  }
}

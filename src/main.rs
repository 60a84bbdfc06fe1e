use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use loom_config::{DebugOptionsUpdate, ExecutionOptions, LogLevel, Workflow};
use loom_engine::{ExecutionUpdate, WorkflowEngine};
use loom_store::{ExecutionStore, SqliteStore};

/// Loom - a workflow execution engine
#[derive(Parser)]
#[command(name = "loom")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.loom)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Run independent nodes concurrently
    #[arg(long)]
    parallel: bool,

    /// Fail the run if it takes longer than this
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Run variable as key=value; values that parse as JSON are used as JSON
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, Value)>,

    /// Engine log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Record the run in the SQLite database under the data directory
    #[arg(long)]
    persist: bool,

    /// Record the run in this SQLite database instead
    #[arg(long)]
    db: Option<PathBuf>,

    /// Print lifecycle events to stderr as they happen
    #[arg(long)]
    watch: bool,
  },

  /// List recorded runs of a workflow, newest first
  History {
    /// Workflow ID
    workflow_id: String,

    /// SQLite database to read (default: <data-dir>/loom.db)
    #[arg(long)]
    db: Option<PathBuf>,
  },
}

fn parse_var(raw: &str) -> Result<(String, Value), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((key.to_string(), value))
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .ok_or_else(|| anyhow!("could not determine home directory"))?
      .join(".loom"),
  };

  match cli.command {
    Some(Commands::Run {
      workflow_file,
      parallel,
      timeout_ms,
      vars,
      log_level,
      persist,
      db,
      watch,
    }) => {
      let options = ExecutionOptions {
        parallel,
        timeout_ms,
        variables: vars.into_iter().collect(),
      };
      let db = db.or_else(|| persist.then(|| data_dir.join("loom.db")));
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(workflow_file, options, log_level, db, watch))?;
    }
    Some(Commands::History { workflow_id, db }) => {
      let db = db.unwrap_or_else(|| data_dir.join("loom.db"));
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(show_history(&workflow_id, &db))?;
    }
    None => {
      println!("loom - use --help to see available commands");
    }
  }

  Ok(())
}

async fn open_store(db: &Path) -> Result<SqliteStore> {
  if let Some(parent) = db.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create data directory: {}", parent.display()))?;
  }
  SqliteStore::open(db)
    .await
    .with_context(|| format!("failed to open database: {}", db.display()))
}

async fn run_workflow(
  workflow_file: PathBuf,
  options: ExecutionOptions,
  log_level: LogLevel,
  db: Option<PathBuf>,
  watch: bool,
) -> Result<()> {
  let workflow = Workflow::load(&workflow_file)
    .with_context(|| format!("failed to load workflow file: {}", workflow_file.display()))?;

  info!(
    workflow_id = %workflow.id,
    nodes = workflow.nodes.len(),
    edges = workflow.edges.len(),
    "loaded workflow {}",
    workflow.name
  );

  let mut engine = WorkflowEngine::new();
  if let Some(db) = &db {
    let store = open_store(db).await?;
    engine = engine.with_store(std::sync::Arc::new(store));
  }
  engine.set_debug_options(DebugOptionsUpdate {
    log_level: Some(log_level),
    ..Default::default()
  });

  if watch {
    engine
      .execution_updates()
      .subscribe(|update: &ExecutionUpdate| match &update.node_id {
        Some(node_id) => eprintln!("[{:?}] {node_id}: {}", update.state, update.message),
        None => eprintln!("[{:?}] {}", update.state, update.message),
      });
  }

  let execution = engine.execute_workflow(workflow, options);
  let run_id = execution.run_id().to_string();

  let wait = execution.wait();
  tokio::pin!(wait);
  let outcome = tokio::select! {
    outcome = &mut wait => outcome,
    _ = tokio::signal::ctrl_c() => {
      eprintln!("Interrupted, aborting run {run_id}");
      engine.abort_execution(&run_id).await;
      wait.await
    }
  };

  let results: Map<String, Value> = engine
    .node_results(&run_id)
    .unwrap_or_default()
    .into_iter()
    .map(|(id, result)| (id, result.to_value()))
    .collect();
  println!("{}", serde_json::to_string_pretty(&results)?);

  outcome.with_context(|| format!("workflow run {run_id} did not complete"))?;

  if let Some(run) = engine.get_run(&run_id) {
    if let Some(metrics) = run.metrics {
      eprintln!(
        "Run {} completed in {}ms ({:.0}% of nodes succeeded)",
        run_id,
        metrics.total_execution_time_ms,
        metrics.success_rate * 100.0
      );
    }
  }

  Ok(())
}

async fn show_history(workflow_id: &str, db: &Path) -> Result<()> {
  let store = open_store(db).await?;
  let records = store
    .list_executions(workflow_id)
    .await
    .context("failed to list executions")?;

  println!("{}", serde_json::to_string_pretty(&records)?);
  Ok(())
}

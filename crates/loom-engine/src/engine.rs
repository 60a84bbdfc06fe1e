//! The run coordinator.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use loom_config::{DebugOptions, DebugOptionsUpdate, ExecutionOptions, NodeType, Workflow};
use loom_store::{ExecutionStatus, ExecutionStore};
use loom_workflow::Graph;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::debug::{DebugController, engine_log};
use crate::error::EngineError;
use crate::events::{EventBus, ExecutionState, ExecutionUpdate, now_millis};
use crate::executor::{NodeExecutor, RunContext};
use crate::handlers::{AgentDelegateHandler, AgentMessenger, HandlerRegistry, NodeHandler};
use crate::history::{ExecutionRun, RunHistory};
use crate::result::{Metrics, NodeResult, RunResults};
use crate::strategy::{run_parallel, run_sequential};
use crate::transport::{
  EXECUTION_ABORTED, EXECUTION_COMPLETED, EXECUTION_FAILED, EXECUTION_STARTED, Transport,
};

/// Runs workflows and keeps their history.
///
/// One engine can drive many runs at once. Debug options, the resume gate
/// and the event subscribers are shared by all of them.
///
/// # Example
///
/// ```ignore
/// let engine = WorkflowEngine::new().with_store(Arc::new(MemoryStore::new()));
/// let (_, mut updates) = engine.execution_updates().subscribe_channel();
///
/// let run_id = engine.run(workflow, ExecutionOptions::default()).await?;
/// let results = engine.node_results(&run_id);
/// ```
pub struct WorkflowEngine {
  handlers: HandlerRegistry,
  debug: DebugController,
  events: EventBus<ExecutionUpdate>,
  history: RunHistory,
  active: Mutex<HashMap<String, CancellationToken>>,
  results: Mutex<HashMap<String, Arc<RunResults>>>,
  store: Option<Arc<dyn ExecutionStore>>,
  transport: Option<Arc<dyn Transport>>,
}

impl Default for WorkflowEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl WorkflowEngine {
  /// An engine with the built-in handlers and no collaborators.
  pub fn new() -> Self {
    Self {
      handlers: HandlerRegistry::default(),
      debug: DebugController::default(),
      events: EventBus::new(),
      history: RunHistory::new(),
      active: Mutex::new(HashMap::new()),
      results: Mutex::new(HashMap::new()),
      store: None,
      transport: None,
    }
  }

  /// Report finished and aborted runs to `store`.
  pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
    self.store = Some(store);
    self
  }

  /// Mirror run lifecycle events to `transport`.
  pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
    self.transport = Some(transport);
    self
  }

  /// Back agent-delegate nodes with `messenger`.
  pub fn with_agent_messenger(mut self, messenger: Arc<dyn AgentMessenger>) -> Self {
    self.handlers.register(
      NodeType::AgentDelegate,
      Arc::new(AgentDelegateHandler::new(Some(messenger))),
    );
    self
  }

  /// Register (or replace) the handler for a node type.
  pub fn with_handler(mut self, node_type: impl Into<NodeType>, handler: Arc<dyn NodeHandler>) -> Self {
    self.handlers.register(node_type, handler);
    self
  }

  pub fn with_debug_options(self, options: DebugOptions) -> Self {
    Self {
      debug: DebugController::new(options),
      ..self
    }
  }

  /// Prepare a run of `workflow`. The run is registered (and abortable)
  /// immediately; it starts when [`WorkflowExecution::wait`] is awaited.
  pub fn execute_workflow(&self, workflow: Workflow, options: ExecutionOptions) -> WorkflowExecution<'_> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    let results = Arc::new(RunResults::new());

    self
      .active
      .lock()
      .unwrap()
      .insert(run_id.clone(), cancel.clone());
    self
      .results
      .lock()
      .unwrap()
      .insert(run_id.clone(), results.clone());
    self.history.push(ExecutionRun::new(&run_id, &workflow.id));

    WorkflowExecution {
      engine: self,
      run_id,
      workflow,
      options,
      cancel,
      results,
    }
  }

  /// Run `workflow` to completion and return its run id.
  pub async fn run(&self, workflow: Workflow, options: ExecutionOptions) -> Result<String, EngineError> {
    self.execute_workflow(workflow, options).wait().await
  }

  /// Abort a running run. Returns `false` for unknown or finished runs.
  ///
  /// Nodes already executing are allowed to finish; nothing new is
  /// dispatched once the run observes the abort.
  pub async fn abort_execution(&self, run_id: &str) -> bool {
    let token = self.active.lock().unwrap().remove(run_id);
    let Some(token) = token else {
      return false;
    };
    token.cancel();
    self.mark_aborted(run_id).await;
    true
  }

  /// Whether `run_id` is registered and not yet finished.
  pub fn is_active(&self, run_id: &str) -> bool {
    self.active.lock().unwrap().contains_key(run_id)
  }

  pub fn debug_options(&self) -> DebugOptions {
    self.debug.options()
  }

  pub fn set_debug_options(&self, update: DebugOptionsUpdate) {
    self.debug.set_options(update);
  }

  /// Resume the paused run, if any.
  pub fn continue_execution(&self) -> bool {
    self.debug.resume()
  }

  pub fn is_paused(&self) -> bool {
    self.debug.is_paused()
  }

  /// Run and node lifecycle events.
  pub fn execution_updates(&self) -> &EventBus<ExecutionUpdate> {
    &self.events
  }

  /// Full history snapshots, published on every change.
  pub fn history_updates(&self) -> &EventBus<Vec<ExecutionRun>> {
    self.history.bus()
  }

  /// All runs, oldest first.
  pub fn execution_history(&self) -> Vec<ExecutionRun> {
    self.history.snapshot()
  }

  pub fn get_run(&self, run_id: &str) -> Option<ExecutionRun> {
    self.history.get(run_id)
  }

  /// Results recorded so far for `run_id`.
  pub fn node_results(&self, run_id: &str) -> Option<BTreeMap<String, NodeResult>> {
    self.run_results(run_id).map(|results| results.snapshot())
  }

  fn run_results(&self, run_id: &str) -> Option<Arc<RunResults>> {
    self.results.lock().unwrap().get(run_id).cloned()
  }

  fn executor(&self) -> NodeExecutor<'_> {
    NodeExecutor {
      handlers: &self.handlers,
      events: &self.events,
      debug: &self.debug,
    }
  }

  async fn mark_aborted(&self, run_id: &str) {
    let results = self
      .run_results(run_id)
      .map(|results| results.snapshot())
      .unwrap_or_default();
    let updated = self.history.update(run_id, |run| {
      if !run.transition(ExecutionStatus::Aborted) {
        return false;
      }
      run.node_results = results;
      true
    });
    let Some((run, true)) = updated else {
      return;
    };

    self.events.emit(&ExecutionUpdate::run(
      run_id,
      ExecutionState::Aborted,
      "Workflow execution aborted",
    ));
    self
      .send(
        EXECUTION_ABORTED,
        json!({
          "workflowId": run.workflow_id,
          "executionId": run_id,
          "timestamp": now_millis(),
        }),
      )
      .await;

    if let Some(store) = &self.store {
      if let Err(e) = store.abort_workflow_execution(&run.workflow_id, run_id).await {
        engine_log!(self.debug, error, run_id = %run_id, error = %e, "failed to record aborted execution");
      }
    }

    engine_log!(self.debug, warn, run_id = %run_id, workflow_id = %run.workflow_id, "workflow_aborted");
  }

  /// Bring an aborted run's results up to date with nodes that finished
  /// after the abort was requested.
  fn refresh_aborted(&self, run_id: &str, results: &RunResults) {
    let results = results.snapshot();
    self.history.update(run_id, |run| {
      if run.status != ExecutionStatus::Aborted || run.node_results == results {
        return false;
      }
      run.node_results = results;
      true
    });
  }

  async fn persist(&self, run: &ExecutionRun) {
    let Some(store) = &self.store else {
      return;
    };
    if let Err(e) = store
      .create_workflow_execution(&run.workflow_id, &run.to_record())
      .await
    {
      engine_log!(self.debug, error, run_id = %run.id, error = %e, "failed to persist execution");
    }
  }

  async fn connect(&self) {
    let Some(transport) = &self.transport else {
      return;
    };
    if let Err(e) = transport.connect().await {
      engine_log!(self.debug, warn, error = %e, "transport connection failed, continuing without it");
    }
  }

  async fn send(&self, event: &str, payload: Value) {
    let Some(transport) = &self.transport else {
      return;
    };
    if let Err(e) = transport.send(event, payload).await {
      engine_log!(self.debug, warn, event, error = %e, "failed to send transport event");
    }
  }
}

/// A prepared workflow run.
///
/// Created by [`WorkflowEngine::execute_workflow`]; awaiting
/// [`WorkflowExecution::wait`] drives it to a terminal status.
pub struct WorkflowExecution<'a> {
  engine: &'a WorkflowEngine,
  run_id: String,
  workflow: Workflow,
  options: ExecutionOptions,
  cancel: CancellationToken,
  results: Arc<RunResults>,
}

impl WorkflowExecution<'_> {
  pub fn run_id(&self) -> &str {
    &self.run_id
  }

  /// Drive the run. Resolves with the run id once it completes.
  #[instrument(
    name = "workflow_execute",
    skip(self),
    fields(
      workflow_id = %self.workflow.id,
      run_id = %self.run_id,
      parallel = self.options.parallel,
    )
  )]
  pub async fn wait(self) -> Result<String, EngineError> {
    let engine = self.engine;
    let run_id = self.run_id.as_str();

    if self.cancel.is_cancelled() {
      return Err(EngineError::Aborted);
    }

    engine.connect().await;
    engine
      .history
      .update(run_id, |run| run.transition(ExecutionStatus::Running));
    engine.events.emit(&ExecutionUpdate::run(
      run_id,
      ExecutionState::Started,
      "Workflow execution started",
    ));
    engine
      .send(
        EXECUTION_STARTED,
        json!({
          "workflowId": self.workflow.id,
          "executionId": run_id,
          "timestamp": now_millis(),
        }),
      )
      .await;
    engine_log!(
      engine.debug,
      info,
      run_id = %run_id,
      workflow_id = %self.workflow.id,
      "workflow_started"
    );

    let started = Instant::now();
    let outcome = self.drive().await;
    let total_ms = started.elapsed().as_millis() as u64;
    engine.active.lock().unwrap().remove(run_id);

    let outcome = match outcome {
      Ok(()) => self.complete(total_ms).await,
      Err(err) => Err(err),
    };

    match outcome {
      Ok(()) => Ok(self.run_id.clone()),
      Err(EngineError::Aborted) => {
        engine.mark_aborted(run_id).await;
        engine.refresh_aborted(run_id, &self.results);
        Err(EngineError::Aborted)
      }
      Err(err) => Err(self.fail(err).await),
    }
  }

  /// Plan and execute with the selected strategy, bounded by the run timeout.
  async fn drive(&self) -> Result<(), EngineError> {
    let engine = self.engine;
    let plan = loom_workflow::plan(&self.workflow)?;
    engine_log!(engine.debug, debug, run_id = %self.run_id, plan = ?plan, "execution plan");

    let run = RunContext {
      run_id: &self.run_id,
      workflow: &self.workflow,
      results: &self.results,
      variables: &self.options.variables,
      cancel: &self.cancel,
    };
    let executor = engine.executor();
    let graph = Graph::new(&self.workflow);

    let strategy = async {
      if self.options.parallel {
        run_parallel(executor, run, &graph, &plan).await
      } else {
        run_sequential(executor, run, &plan).await
      }
    };

    let Some(timeout_ms) = self.options.timeout_ms else {
      return strategy.await;
    };
    match tokio::time::timeout(Duration::from_millis(timeout_ms), strategy).await {
      Ok(outcome) => outcome,
      Err(_) => {
        self.cancel.cancel();
        // The strategy was dropped mid-node; close out what was running.
        for (node_id, elapsed_ms) in self.results.take_running() {
          self
            .results
            .insert(&node_id, NodeResult::failure("execution timed out", elapsed_ms));
          engine.events.emit(&ExecutionUpdate::node(
            &self.run_id,
            &node_id,
            ExecutionState::Failed,
            "execution timed out",
          ));
          engine_log!(engine.debug, error, node_id = %node_id, elapsed_ms, "node timed out");
        }
        Err(EngineError::Timeout { timeout_ms })
      }
    }
  }

  /// Record completion. Fails with `Aborted` if an abort got there first.
  async fn complete(&self, total_ms: u64) -> Result<(), EngineError> {
    let engine = self.engine;
    let results = self.results.snapshot();
    let metrics = Metrics::compute(&results, total_ms);

    let updated = engine.history.update(&self.run_id, |run| {
      if !run.transition(ExecutionStatus::Completed) {
        return false;
      }
      run.node_results = results;
      run.metrics = Some(metrics.clone());
      true
    });
    let Some((run, true)) = updated else {
      return Err(EngineError::Aborted);
    };

    let metrics_json = serde_json::to_value(&metrics).unwrap_or(Value::Null);
    engine.events.emit(
      &ExecutionUpdate::run(
        &self.run_id,
        ExecutionState::Completed,
        "Workflow execution completed",
      )
      .with_result(json!({ "metrics": metrics_json.clone() })),
    );
    engine
      .send(
        EXECUTION_COMPLETED,
        json!({
          "workflowId": run.workflow_id,
          "executionId": run.id,
          "timestamp": now_millis(),
          "metrics": metrics_json,
        }),
      )
      .await;
    engine.persist(&run).await;

    engine_log!(
      engine.debug,
      info,
      run_id = %self.run_id,
      total_ms,
      success_rate = metrics.success_rate,
      "workflow_completed"
    );
    Ok(())
  }

  /// Record failure and return the error the caller should see.
  async fn fail(&self, err: EngineError) -> EngineError {
    let engine = self.engine;
    let results = self.results.snapshot();
    let message = err.to_string();

    let updated = engine.history.update(&self.run_id, |run| {
      if !run.transition(ExecutionStatus::Failed) {
        return false;
      }
      run.error = Some(message.clone());
      run.node_results = results;
      true
    });
    let Some((run, true)) = updated else {
      // Aborted while the failure was in flight.
      return EngineError::Aborted;
    };

    engine.events.emit(&ExecutionUpdate::run(
      &self.run_id,
      ExecutionState::Failed,
      message.clone(),
    ));
    engine
      .send(
        EXECUTION_FAILED,
        json!({
          "workflowId": run.workflow_id,
          "executionId": run.id,
          "timestamp": now_millis(),
          "error": message,
        }),
      )
      .await;
    engine.persist(&run).await;

    engine_log!(engine.debug, error, run_id = %self.run_id, error = %err, "workflow_failed");
    err
  }
}

impl Drop for WorkflowExecution<'_> {
  /// A run dropped before it finished (never awaited, or its `wait` future
  /// was cancelled) ends as aborted.
  fn drop(&mut self) {
    if let Ok(mut active) = self.engine.active.lock() {
      active.remove(&self.run_id);
    }
    self.cancel.cancel();

    let results = self.results.snapshot();
    let updated = self.engine.history.update(&self.run_id, |run| {
      if !run.transition(ExecutionStatus::Aborted) {
        return false;
      }
      run.node_results = results;
      true
    });
    if let Some((_, true)) = updated {
      self.engine.events.emit(&ExecutionUpdate::run(
        &self.run_id,
        ExecutionState::Aborted,
        "Workflow execution dropped",
      ));
      engine_log!(self.engine.debug, warn, run_id = %self.run_id, "workflow_dropped");
    }
  }
}

//! Single node execution.

use std::time::Instant;

use loom_config::Workflow;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::debug::{DebugController, engine_log};
use crate::error::EngineError;
use crate::events::{EventBus, ExecutionState, ExecutionUpdate};
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::input::resolve_inputs;
use crate::result::{NodeResult, RunResults};

/// Everything a strategy needs to know about the run it is driving.
#[derive(Clone, Copy)]
pub(crate) struct RunContext<'a> {
  pub run_id: &'a str,
  pub workflow: &'a Workflow,
  pub results: &'a RunResults,
  pub variables: &'a Map<String, Value>,
  pub cancel: &'a CancellationToken,
}

/// Dispatches one node to its handler and records the outcome.
#[derive(Clone, Copy)]
pub(crate) struct NodeExecutor<'a> {
  pub handlers: &'a HandlerRegistry,
  pub events: &'a EventBus<ExecutionUpdate>,
  pub debug: &'a DebugController,
}

impl NodeExecutor<'_> {
  /// Execute `node_id` once.
  ///
  /// Both success and handler failure are recorded in the run's results and
  /// announced before returning, so a failed node always leaves a failure
  /// result behind for retry/continue decisions and downstream inputs.
  #[instrument(
    name = "node_execute",
    skip_all,
    fields(run_id = %run.run_id, node_id = %node_id)
  )]
  pub async fn execute(&self, run: RunContext<'_>, node_id: &str) -> Result<NodeResult, EngineError> {
    let node = run
      .workflow
      .get_node(node_id)
      .ok_or_else(|| EngineError::NodeNotFound {
        node_id: node_id.to_string(),
      })?;
    let name = node.display_name();

    self.events.emit(&ExecutionUpdate::node(
      run.run_id,
      node_id,
      ExecutionState::Running,
      format!("Executing node: {name}"),
    ));
    engine_log!(self.debug, info, node_id = %node_id, node_type = %node.node_type, "Executing node: {name} ({node_id})");

    let started = Instant::now();
    run.results.mark_running(node_id);
    let inputs = resolve_inputs(run.workflow, run.results, node_id);
    engine_log!(self.debug, debug, node_id = %node_id, inputs = ?inputs, "node inputs");

    let ctx = HandlerContext::new(run.run_id, run.variables).with_log_level(self.debug.log_level());
    let outcome = self
      .handlers
      .get(&node.node_type)
      .handle(node, inputs, ctx)
      .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
      Ok(output) => {
        let result = NodeResult::success(output, elapsed_ms);
        run.results.insert(node_id, result.clone());

        engine_log!(self.debug, info, node_id = %node_id, elapsed_ms, "Node execution completed: {name} ({node_id}) in {elapsed_ms}ms");
        engine_log!(self.debug, debug, node_id = %node_id, result = ?result, "node result");

        self.events.emit(
          &ExecutionUpdate::node(
            run.run_id,
            node_id,
            ExecutionState::Completed,
            "Node execution completed",
          )
          .with_result(result.to_value()),
        );
        Ok(result)
      }
      Err(source) => {
        let message = source.to_string();
        run
          .results
          .insert(node_id, NodeResult::failure(message.clone(), elapsed_ms));

        self.events.emit(&ExecutionUpdate::node(
          run.run_id,
          node_id,
          ExecutionState::Failed,
          message.clone(),
        ));
        engine_log!(self.debug, error, node_id = %node_id, elapsed_ms, error = %message, "Node execution failed: {name} ({node_id}) after {elapsed_ms}ms");

        Err(EngineError::NodeExecution {
          node_id: node_id.to_string(),
          source,
        })
      }
    }
  }
}

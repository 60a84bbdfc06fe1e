//! Sequential and parallel execution of a plan.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt, Shared, join_all, try_join_all};
use loom_config::Node;
use loom_workflow::Graph;

use crate::debug::engine_log;
use crate::error::EngineError;
use crate::executor::{NodeExecutor, RunContext};
use crate::retry::FailureAction;

/// Run the plan one node at a time, honouring debug pauses and each node's
/// retry policy. Abort is checked before every node and while paused or
/// backing off.
pub(crate) async fn run_sequential(
  executor: NodeExecutor<'_>,
  run: RunContext<'_>,
  plan: &[String],
) -> Result<(), EngineError> {
  for node_id in plan {
    if run.cancel.is_cancelled() {
      engine_log!(executor.debug, warn, run_id = %run.run_id, "workflow cancelled");
      return Err(EngineError::Aborted);
    }

    tokio::select! {
      biased;
      _ = run.cancel.cancelled() => {
        engine_log!(executor.debug, warn, run_id = %run.run_id, node_id = %node_id, "workflow cancelled while paused");
        return Err(EngineError::Aborted);
      }
      _ = executor.debug.maybe_pause(node_id) => {}
    }

    if let Err(err) = executor.execute(run, node_id).await {
      recover(executor, run, node_id, err).await?;
    }
  }

  Ok(())
}

/// Apply the failed node's retry policy. `Ok` means the run may go on.
async fn recover(
  executor: NodeExecutor<'_>,
  run: RunContext<'_>,
  node_id: &str,
  err: EngineError,
) -> Result<(), EngineError> {
  let policy = run
    .workflow
    .get_node(node_id)
    .map(Node::retry_policy)
    .unwrap_or_default();

  match FailureAction::for_policy(&policy) {
    FailureAction::Propagate => Err(err),
    FailureAction::Continue => {
      engine_log!(executor.debug, warn, node_id = %node_id, error = %err, "node failed, continuing with next node");
      Ok(())
    }
    FailureAction::Retry(max_retries) => {
      let mut last = err;
      for attempt in 0..max_retries {
        let delay = policy.backoff(attempt);
        engine_log!(
          executor.debug,
          warn,
          node_id = %node_id,
          attempt = attempt + 1,
          max_retries,
          delay_ms = delay.as_millis() as u64,
          error = %last,
          "retrying node"
        );

        tokio::select! {
          biased;
          _ = run.cancel.cancelled() => return Err(EngineError::Aborted),
          _ = tokio::time::sleep(delay) => {}
        }

        match executor.execute(run, node_id).await {
          Ok(_) => return Ok(()),
          Err(e) => last = e,
        }
      }
      Err(last)
    }
  }
}

type NodeTask<'a> = Shared<BoxFuture<'a, Result<(), EngineError>>>;

/// Run every node as soon as its direct dependencies have succeeded.
///
/// Each node gets a shared task that first awaits its dependencies' tasks,
/// then checks for abort, then executes. A failure reaches every dependent
/// through its dependency chain; independent nodes already running are left
/// to finish. Debug pauses and retry policies do not apply here.
pub(crate) async fn run_parallel(
  executor: NodeExecutor<'_>,
  run: RunContext<'_>,
  graph: &Graph,
  plan: &[String],
) -> Result<(), EngineError> {
  let mut tasks: HashMap<&str, NodeTask<'_>> = HashMap::with_capacity(plan.len());

  // Plan order guarantees dependencies are created first.
  for node_id in plan {
    let dependencies: Vec<NodeTask<'_>> = graph
      .upstream(node_id)
      .iter()
      .filter_map(|dep| tasks.get(dep.as_str()).cloned())
      .collect();

    let task = async move {
      try_join_all(dependencies).await?;
      if run.cancel.is_cancelled() {
        return Err(EngineError::Aborted);
      }
      executor.execute(run, node_id).await.map(|_| ())
    }
    .boxed()
    .shared();

    tasks.insert(node_id.as_str(), task);
  }

  let outcomes = join_all(plan.iter().map(|node_id| tasks[node_id.as_str()].clone())).await;

  // First failure in plan order is a root cause, not a dependent echoing it.
  outcomes.into_iter().collect::<Result<Vec<()>, _>>()?;
  Ok(())
}

//! Execution planning.
//!
//! The plan is a depth-first topological order in which every node appears
//! after all of its dependencies, so it can be executed front to back.

use std::collections::HashSet;

use loom_config::Workflow;
use tracing::debug;

use crate::error::WorkflowError;
use crate::graph::Graph;

/// Produce the execution order for `workflow`.
///
/// The traversal is seeded with the nodes reachable from the roots (nodes
/// without incoming edges) in discovery order, and each node's dependencies
/// are emitted before the node itself. Remaining nodes are walked afterwards
/// so that cycles are reported even when no root leads to them.
///
/// # Errors
/// - [`WorkflowError::CyclicWorkflow`] if the edges contain a directed cycle.
/// - [`WorkflowError::UnreachableNodes`] if some node cannot be reached from
///   any root.
pub fn plan(workflow: &Workflow) -> Result<Vec<String>, WorkflowError> {
  let graph = Graph::new(workflow);
  let reachable = graph.reachable();

  let mut planner = Planner {
    graph: &graph,
    visited: HashSet::new(),
    in_progress: HashSet::new(),
    order: Vec::with_capacity(graph.nodes().len()),
  };

  for &node_id in &reachable {
    planner.visit(node_id)?;
  }

  let reachable_set: HashSet<&str> = reachable.iter().copied().collect();
  let unreachable: Vec<&str> = graph
    .nodes()
    .iter()
    .map(String::as_str)
    .filter(|id| !reachable_set.contains(id))
    .collect();

  for &node_id in &unreachable {
    planner.visit(node_id)?;
  }

  if !unreachable.is_empty() {
    return Err(WorkflowError::UnreachableNodes {
      node_ids: unreachable.iter().map(|id| id.to_string()).collect(),
    });
  }

  debug!(workflow_id = %workflow.id, plan = ?planner.order, "execution plan created");
  Ok(planner.order)
}

struct Planner<'g> {
  graph: &'g Graph,
  visited: HashSet<&'g str>,
  in_progress: HashSet<&'g str>,
  order: Vec<String>,
}

impl<'g> Planner<'g> {
  /// Emit `start` after its dependencies. Iterative so that long chains do
  /// not grow the call stack.
  fn visit(&mut self, start: &'g str) -> Result<(), WorkflowError> {
    if self.visited.contains(start) {
      return Ok(());
    }

    let mut stack: Vec<(&'g str, usize)> = vec![(start, 0)];
    self.in_progress.insert(start);

    while let Some((node_id, next_dep)) = stack.last_mut() {
      let node_id: &'g str = *node_id;
      let dependencies = self.graph.upstream(node_id);

      if *next_dep < dependencies.len() {
        let dep = dependencies[*next_dep].as_str();
        *next_dep += 1;

        if !self.graph.contains(dep) || self.visited.contains(dep) {
          continue;
        }
        if self.in_progress.contains(dep) {
          return Err(WorkflowError::CyclicWorkflow {
            node_id: dep.to_string(),
          });
        }
        self.in_progress.insert(dep);
        stack.push((dep, 0));
      } else {
        stack.pop();
        self.in_progress.remove(node_id);
        self.visited.insert(node_id);
        self.order.push(node_id.to_string());
      }
    }

    Ok(())
  }
}

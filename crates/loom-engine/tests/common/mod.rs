//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loom_config::{Edge, Node, Workflow};
use loom_engine::{HandlerContext, HandlerError, NodeHandler};
use serde_json::{Map, Value, json};

/// Build a workflow from `(id, type)` pairs and `(source, target)` edges.
pub fn workflow(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> Workflow {
  let mut workflow = Workflow::new("wf-test", "test workflow");
  workflow.nodes = nodes
    .iter()
    .map(|(id, node_type)| Node::new(*id, *node_type))
    .collect();
  workflow.edges = edges
    .iter()
    .map(|(source, target)| Edge::new(*source, *target))
    .collect();
  workflow
}

/// Replace a node's definition in place.
pub fn configure(workflow: &mut Workflow, node_id: &str, f: impl FnOnce(Node) -> Node) {
  let index = workflow
    .nodes
    .iter()
    .position(|node| node.id == node_id)
    .expect("node exists");
  let node = workflow.nodes.remove(index);
  workflow.nodes.insert(index, f(node));
}

/// Records `start:<id>` and `end:<id>` around an optional `delayMs` sleep.
#[derive(Clone, Default)]
pub struct Probe {
  pub log: Arc<Mutex<Vec<String>>>,
}

impl Probe {
  pub fn entries(&self) -> Vec<String> {
    self.log.lock().unwrap().clone()
  }

  pub fn position(&self, entry: &str) -> usize {
    self
      .entries()
      .iter()
      .position(|e| e == entry)
      .unwrap_or_else(|| panic!("missing log entry {entry}"))
  }

  pub fn contains(&self, entry: &str) -> bool {
    self.entries().iter().any(|e| e == entry)
  }
}

#[async_trait]
impl NodeHandler for Probe {
  async fn handle(
    &self,
    node: &Node,
    inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    self.log.lock().unwrap().push(format!("start:{}", node.id));
    if let Some(ms) = node.data.config.get("delayMs").and_then(Value::as_u64) {
      tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    self.log.lock().unwrap().push(format!("end:{}", node.id));
    Ok(json!({ "node": node.id, "inputs": inputs }))
  }
}

/// Always fails, counting invocations.
#[derive(Clone, Default)]
pub struct Failing {
  pub calls: Arc<AtomicUsize>,
}

impl Failing {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl NodeHandler for Failing {
  async fn handle(
    &self,
    node: &Node,
    _inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Err(HandlerError::Failed(format!("{} exploded", node.id)))
  }
}

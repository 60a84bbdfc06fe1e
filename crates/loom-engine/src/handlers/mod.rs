//! Node handlers and the type-keyed registry that dispatches to them.
//!
//! A handler receives a node and its resolved inputs and returns an arbitrary
//! JSON output. The registry maps [`NodeType::as_str`] tags to handlers;
//! types without a registered handler go to [`GenericHandler`], so new node
//! types plug in through [`HandlerRegistry::register`] without touching the
//! executor.

mod agent;
mod basic;
mod condition;
mod expression;
mod transform;

pub use agent::{AgentDelegateHandler, AgentMessage, AgentMessenger, MessageMetadata};
pub use basic::{AgentHandler, ExternalToolHandler, GenericHandler, NotificationHandler, PassthroughHandler};
pub use condition::ConditionHandler;
pub use transform::TransformHandler;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use loom_config::{LogLevel, Node, NodeType};
use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Per-invocation context handed to a handler.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
  pub run_id: &'a str,
  /// Run variables from `ExecutionOptions::variables`.
  pub variables: &'a Map<String, Value>,
  /// The engine's log level at dispatch time.
  pub log_level: LogLevel,
}

impl<'a> HandlerContext<'a> {
  pub fn new(run_id: &'a str, variables: &'a Map<String, Value>) -> Self {
    Self {
      run_id,
      variables,
      log_level: LogLevel::default(),
    }
  }

  pub fn with_log_level(self, log_level: LogLevel) -> Self {
    Self { log_level, ..self }
  }

  /// Whether a handler message at `level` should be logged.
  pub fn logs(&self, level: LogLevel) -> bool {
    self.log_level.allows(level)
  }
}

/// Executes nodes of one type.
#[async_trait]
pub trait NodeHandler: Send + Sync {
  async fn handle(
    &self,
    node: &Node,
    inputs: Map<String, Value>,
    ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError>;
}

/// Lookup table from node type tag to handler.
pub struct HandlerRegistry {
  handlers: HashMap<String, Arc<dyn NodeHandler>>,
  fallback: Arc<dyn NodeHandler>,
}

impl Default for HandlerRegistry {
  fn default() -> Self {
    Self::builtin(None)
  }
}

impl HandlerRegistry {
  /// A registry with no handlers; everything goes to the fallback.
  pub fn empty() -> Self {
    Self {
      handlers: HashMap::new(),
      fallback: Arc::new(GenericHandler),
    }
  }

  /// A registry with the built-in handlers. `messenger` backs
  /// agent-delegate nodes, which fail without one.
  pub fn builtin(messenger: Option<Arc<dyn AgentMessenger>>) -> Self {
    let mut registry = Self::empty();
    registry.register(NodeType::Input, Arc::new(PassthroughHandler));
    registry.register(NodeType::Output, Arc::new(PassthroughHandler));
    registry.register(NodeType::Condition, Arc::new(ConditionHandler));
    registry.register(NodeType::Transform, Arc::new(TransformHandler));
    registry.register(NodeType::Notification, Arc::new(NotificationHandler));
    registry.register(NodeType::ExternalTool, Arc::new(ExternalToolHandler));
    registry.register(NodeType::AgentDelegate, Arc::new(AgentDelegateHandler::new(messenger)));
    registry.register("agent", Arc::new(AgentHandler));
    registry
  }

  /// Register (or replace) the handler for a node type.
  pub fn register(&mut self, node_type: impl Into<NodeType>, handler: Arc<dyn NodeHandler>) {
    self.handlers.insert(node_type.into().as_str().to_string(), handler);
  }

  /// Handler for `node_type`, or the generic fallback.
  pub fn get(&self, node_type: &NodeType) -> &Arc<dyn NodeHandler> {
    self.handlers.get(node_type.as_str()).unwrap_or(&self.fallback)
  }

  pub fn contains(&self, node_type: &NodeType) -> bool {
    self.handlers.contains_key(node_type.as_str())
  }
}

pub(crate) fn timestamp() -> Value {
  Value::String(chrono::Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  struct Fixed;

  #[async_trait]
  impl NodeHandler for Fixed {
    async fn handle(&self, _: &Node, _: Map<String, Value>, _: HandlerContext<'_>) -> Result<Value, HandlerError> {
      Ok(json!("fixed"))
    }
  }

  #[tokio::test]
  async fn test_unknown_type_uses_fallback() {
    let registry = HandlerRegistry::default();
    let node = Node::new("n", "custom");
    let vars = Map::new();
    let ctx = HandlerContext::new("r", &vars);

    assert!(!registry.contains(&node.node_type));
    let output = registry.get(&node.node_type).handle(&node, Map::new(), ctx).await.unwrap();
    assert_eq!(output["result"], "Executed node: n");
  }

  #[test]
  fn test_context_log_level_gates_handler_logs() {
    let vars = Map::new();
    let ctx = HandlerContext::new("r", &vars);
    assert!(ctx.logs(LogLevel::Warn));
    assert!(!ctx.logs(LogLevel::Debug));

    let quiet = ctx.with_log_level(LogLevel::Error);
    assert!(!quiet.logs(LogLevel::Warn));
    assert!(quiet.logs(LogLevel::Error));
  }

  #[tokio::test]
  async fn test_register_extension_type() {
    let mut registry = HandlerRegistry::default();
    registry.register("custom", Arc::new(Fixed));
    let node = Node::new("n", "custom");
    let vars = Map::new();
    let ctx = HandlerContext::new("r", &vars);

    let output = registry.get(&node.node_type).handle(&node, Map::new(), ctx).await.unwrap();
    assert_eq!(output, json!("fixed"));
  }

  #[test]
  fn test_alias_tags_share_handler_key() {
    let registry = HandlerRegistry::default();
    assert!(registry.contains(&NodeType::from("a2a")));
    assert!(registry.contains(&NodeType::from("mcpTool")));
    assert!(registry.contains(&NodeType::from("agent")));
  }
}

use async_trait::async_trait;
use loom_config::Node;
use serde_json::{Map, Value, json};

use super::{HandlerContext, NodeHandler, timestamp};
use crate::error::HandlerError;

/// `input` and `output` nodes: echo the resolved inputs.
pub struct PassthroughHandler;

#[async_trait]
impl NodeHandler for PassthroughHandler {
  async fn handle(
    &self,
    _node: &Node,
    inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    Ok(Value::Object(inputs))
  }
}

/// `notification` nodes: describe the notification that would be shown.
pub struct NotificationHandler;

#[async_trait]
impl NodeHandler for NotificationHandler {
  async fn handle(
    &self,
    node: &Node,
    _inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    Ok(json!({
      "success": true,
      "notification": {
        "type": node.config_str("type").unwrap_or("info"),
        "channel": node.config_str("channel").unwrap_or("ui"),
        "title": node.config_str("title").unwrap_or("Notification"),
        "message": node.config_str("message").unwrap_or("No message"),
      },
      "timestamp": timestamp(),
    }))
  }
}

/// `external-tool` nodes.
pub struct ExternalToolHandler;

#[async_trait]
impl NodeHandler for ExternalToolHandler {
  async fn handle(
    &self,
    node: &Node,
    _inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    let tool_id = node.config_str("toolId").unwrap_or("unknown");
    Ok(json!({
      "success": true,
      "result": format!("Executed external tool: {tool_id}"),
      "timestamp": timestamp(),
    }))
  }
}

/// Local `agent` nodes, as opposed to delegated ones.
pub struct AgentHandler;

#[async_trait]
impl NodeHandler for AgentHandler {
  async fn handle(
    &self,
    node: &Node,
    _inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    let agent_id = node.config_str("agentId").unwrap_or("unknown");
    Ok(json!({
      "success": true,
      "result": format!("Executed agent: {agent_id}"),
      "timestamp": timestamp(),
    }))
  }
}

/// Fallback for node types without a registered handler.
pub struct GenericHandler;

#[async_trait]
impl NodeHandler for GenericHandler {
  async fn handle(
    &self,
    node: &Node,
    inputs: Map<String, Value>,
    _ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    Ok(json!({
      "success": true,
      "result": format!("Executed node: {}", node.id),
      "inputs": inputs,
      "timestamp": timestamp(),
    }))
  }
}

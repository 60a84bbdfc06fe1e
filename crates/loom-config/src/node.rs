use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::retry::RetryPolicy;

/// The kind of a node, which selects the handler that executes it.
///
/// Built-in kinds have dedicated variants; anything else is kept verbatim in
/// [`NodeType::Other`] so that extension handlers can be registered for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
  Input,
  Output,
  Transform,
  Condition,
  Notification,
  AgentDelegate,
  ExternalTool,
  Other(String),
}

impl NodeType {
  /// Canonical tag, also used as the handler registry key.
  pub fn as_str(&self) -> &str {
    match self {
      NodeType::Input => "input",
      NodeType::Output => "output",
      NodeType::Transform => "transform",
      NodeType::Condition => "condition",
      NodeType::Notification => "notification",
      NodeType::AgentDelegate => "agent-delegate",
      NodeType::ExternalTool => "external-tool",
      NodeType::Other(tag) => tag,
    }
  }
}

impl From<String> for NodeType {
  fn from(tag: String) -> Self {
    match tag.as_str() {
      "input" => NodeType::Input,
      "output" => NodeType::Output,
      "transform" => NodeType::Transform,
      "condition" => NodeType::Condition,
      "notification" => NodeType::Notification,
      "agent-delegate" | "a2a" => NodeType::AgentDelegate,
      "external-tool" | "mcpTool" => NodeType::ExternalTool,
      _ => NodeType::Other(tag),
    }
  }
}

impl From<&str> for NodeType {
  fn from(tag: &str) -> Self {
    NodeType::from(tag.to_string())
  }
}

impl From<NodeType> for String {
  fn from(node_type: NodeType) -> Self {
    node_type.as_str().to_string()
  }
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Human name plus the free-form, type-specific configuration of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default)]
  pub config: Map<String, Value>,
}

/// A single step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub id: String,
  #[serde(rename = "type")]
  pub node_type: NodeType,
  #[serde(default)]
  pub data: NodeData,
}

impl Node {
  /// Create a node with an empty configuration.
  pub fn new(id: impl Into<String>, node_type: impl Into<NodeType>) -> Self {
    Self {
      id: id.into(),
      node_type: node_type.into(),
      data: NodeData::default(),
    }
  }

  /// Set the human readable name.
  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.data.name = Some(name.into());
    self
  }

  /// Set one configuration entry.
  pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
    self.data.config.insert(key.into(), value);
    self
  }

  /// Name used in log lines and lifecycle messages.
  pub fn display_name(&self) -> &str {
    self
      .data
      .name
      .as_deref()
      .unwrap_or_else(|| self.node_type.as_str())
  }

  /// String configuration value, if present.
  pub fn config_str(&self, key: &str) -> Option<&str> {
    self.data.config.get(key).and_then(Value::as_str)
  }

  /// The node's `retryPolicy`, or the default policy when absent or malformed.
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::from_config(&self.data.config)
  }
}

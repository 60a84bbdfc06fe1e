use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::ConfigError;
use crate::node::Node;

/// A workflow definition. Runs operate on their own clone of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub nodes: Vec<Node>,
  #[serde(default)]
  pub edges: Vec<Edge>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

impl Workflow {
  /// Create an empty workflow.
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: None,
      nodes: Vec::new(),
      edges: Vec::new(),
      version: None,
    }
  }

  /// Parse a workflow from its JSON representation.
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Read and parse a workflow file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&content)
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.nodes.iter().find(|node| node.id == node_id)
  }

  /// Edges whose target is `node_id`, in definition order.
  pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
    self.edges.iter().filter(move |edge| edge.target == node_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_workflow_document() {
    let workflow = Workflow::from_json_str(
      r#"{
        "id": "wf",
        "name": "Handles",
        "version": "2",
        "nodes": [
          { "id": "a", "type": "input" },
          { "id": "b", "type": "output" }
        ],
        "edges": [
          { "source": "a", "target": "b", "sourceHandle": "out", "targetHandle": "in" }
        ]
      }"#,
    )
    .unwrap();

    assert_eq!(workflow.nodes.len(), 2);
    assert_eq!(workflow.version.as_deref(), Some("2"));
    assert_eq!(workflow.edges[0].handles(), Some(("out", "in")));
    assert!(workflow.get_node("b").is_some());
    assert_eq!(workflow.incoming_edges("b").count(), 1);
    assert_eq!(workflow.incoming_edges("a").count(), 0);
  }

  #[test]
  fn test_parse_error() {
    let result = Workflow::from_json_str("{ \"id\": 1 }");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
  }

  #[test]
  fn test_load_missing_file() {
    let result = Workflow::load("/definitely/not/here.json");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
  }
}

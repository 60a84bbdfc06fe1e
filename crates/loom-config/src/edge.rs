use serde::{Deserialize, Serialize};

/// A directed link between two nodes.
///
/// When both handles are set, only the named field of the source output is
/// routed into the named input of the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
  pub source: String,
  pub target: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_handle: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_handle: Option<String>,
}

impl Edge {
  /// Create an edge without handles.
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      source_handle: None,
      target_handle: None,
    }
  }

  /// Route `source_handle` of the source output into `target_handle`.
  pub fn with_handles(
    mut self,
    source_handle: impl Into<String>,
    target_handle: impl Into<String>,
  ) -> Self {
    self.source_handle = Some(source_handle.into());
    self.target_handle = Some(target_handle.into());
    self
  }

  /// Both handles, if the edge routes a single field.
  pub fn handles(&self) -> Option<(&str, &str)> {
    match (&self.source_handle, &self.target_handle) {
      (Some(source), Some(target)) => Some((source.as_str(), target.as_str())),
      _ => None,
    }
  }
}

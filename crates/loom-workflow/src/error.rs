use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("workflow has a cycle through node '{node_id}'")]
  CyclicWorkflow { node_id: String },

  #[error("workflow has unreachable nodes: {}", node_ids.join(", "))]
  UnreachableNodes { node_ids: Vec<String> },
}

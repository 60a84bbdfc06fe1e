use std::collections::{HashMap, HashSet, VecDeque};

use loom_config::Workflow;

/// Graph structure for traversal and analysis.
///
/// All lists preserve the order of the workflow's node and edge lists.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Node ids in definition order.
  nodes: Vec<String>,
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: node_id -> list of upstream node_ids (its dependencies).
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no incoming edges.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from a workflow's nodes and edges.
  pub fn new(workflow: &Workflow) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    let nodes: Vec<String> = workflow.nodes.iter().map(|n| n.id.clone()).collect();
    for node_id in &nodes {
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for edge in &workflow.edges {
      adjacency
        .entry(edge.source.clone())
        .or_default()
        .push(edge.target.clone());
      reverse_adjacency
        .entry(edge.target.clone())
        .or_default()
        .push(edge.source.clone());
    }

    let entry_points: Vec<String> = nodes
      .iter()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    Self {
      nodes,
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  /// Node ids in definition order.
  pub fn nodes(&self) -> &[String] {
    &self.nodes
  }

  /// Whether `node_id` is a node of the workflow (edges may name unknown ids).
  pub fn contains(&self, node_id: &str) -> bool {
    self.nodes.iter().any(|id| id == node_id)
  }

  /// Get entry points (nodes with no incoming edges).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get downstream nodes for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream nodes (dependencies) for a given node, one per incoming edge.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Nodes reachable from the entry points by following edges downstream,
  /// in breadth-first discovery order.
  pub fn reachable(&self) -> Vec<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order: Vec<&str> = Vec::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    for entry in &self.entry_points {
      if seen.insert(entry.as_str()) {
        queue.push_back(entry.as_str());
      }
    }

    while let Some(node_id) = queue.pop_front() {
      order.push(node_id);
      for next in self.downstream(node_id) {
        if self.contains(next) && seen.insert(next.as_str()) {
          queue.push_back(next.as_str());
        }
      }
    }

    order
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use loom_config::{Edge, Node};

  fn workflow(nodes: &[&str], edges: &[(&str, &str)]) -> Workflow {
    let mut workflow = Workflow::new("wf", "Graph");
    workflow.nodes = nodes.iter().map(|id| Node::new(*id, "generic")).collect();
    workflow.edges = edges.iter().map(|(s, t)| Edge::new(*s, *t)).collect();
    workflow
  }

  #[test]
  fn test_entry_points_and_adjacency() {
    let graph = Graph::new(&workflow(&["a", "b", "c"], &[("a", "c"), ("b", "c")]));

    assert_eq!(graph.entry_points(), &["a".to_string(), "b".to_string()]);
    assert_eq!(graph.upstream("c"), &["a".to_string(), "b".to_string()]);
    assert_eq!(graph.downstream("a"), &["c".to_string()]);
    assert!(graph.upstream("missing").is_empty());
  }

  #[test]
  fn test_reachable_skips_cycle_without_root() {
    let graph = Graph::new(&workflow(
      &["a", "b", "x", "y"],
      &[("a", "b"), ("x", "y"), ("y", "x")],
    ));
    assert_eq!(graph.reachable(), vec!["a", "b"]);
  }
}

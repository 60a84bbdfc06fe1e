//! Input resolution from upstream node results.

use loom_config::Workflow;
use serde_json::{Map, Value};

use crate::result::RunResults;

/// Build the input payload for `node_id` from the results already recorded
/// for its upstream nodes.
///
/// Edges with both handles set route `source[source_handle]` (or the whole
/// source result when that field is missing) into `target_handle`. Edges
/// without handles put the whole source result under `input`; when several
/// do, the last one in edge order wins. Upstream nodes without a recorded
/// result contribute nothing.
pub fn resolve_inputs(workflow: &Workflow, results: &RunResults, node_id: &str) -> Map<String, Value> {
  let mut inputs = Map::new();

  for edge in workflow.incoming_edges(node_id) {
    let Some(source) = results.get(&edge.source) else {
      continue;
    };
    let source = source.to_value();

    match edge.handles() {
      Some((source_handle, target_handle)) => {
        let value = match source.get(source_handle) {
          Some(field) if !field.is_null() => field.clone(),
          _ => source,
        };
        inputs.insert(target_handle.to_string(), value);
      }
      None => {
        inputs.insert("input".to_string(), source);
      }
    }
  }

  inputs
}

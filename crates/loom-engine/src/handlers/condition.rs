use async_trait::async_trait;
use loom_config::Node;
use serde_json::{Map, Value, json};

use super::expression;
use super::{HandlerContext, NodeHandler};
use crate::error::HandlerError;

/// `condition` nodes: evaluate `config.condition` to a boolean.
///
/// Outputs `{result, inputs}`. A node without a condition is true.
pub struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
  async fn handle(
    &self,
    node: &Node,
    inputs: Map<String, Value>,
    ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    let result = match node.config_str("condition") {
      Some(condition) if !condition.trim().is_empty() => {
        expression::evaluate("Condition", condition, &inputs, ctx.variables)?.is_true()
      }
      _ => true,
    };

    Ok(json!({ "result": result, "inputs": inputs }))
  }
}

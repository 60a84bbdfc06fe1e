use async_trait::async_trait;
use loom_config::Node;
use serde_json::{Map, Value};

use super::expression;
use super::{HandlerContext, NodeHandler};
use crate::error::HandlerError;

/// `transform` nodes.
///
/// `config.transformType` selects how `config.transformCode` is applied:
/// - `expression` / `json-path`: evaluated as an expression; its value is the output
/// - `template`: rendered as a template; output that parses as JSON is returned as JSON
///
/// Without code, or with an unknown transform type, inputs pass through.
pub struct TransformHandler;

#[async_trait]
impl NodeHandler for TransformHandler {
  async fn handle(
    &self,
    node: &Node,
    inputs: Map<String, Value>,
    ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    let Some(code) = node.config_str("transformCode").filter(|code| !code.is_empty()) else {
      return Ok(Value::Object(inputs));
    };

    match node.config_str("transformType").unwrap_or("expression") {
      "expression" | "json-path" => {
        let value = expression::evaluate("Transform", code, &inputs, ctx.variables)?;
        expression::to_json("Transform", &value)
      }
      "template" => {
        let rendered = expression::render("Transform", code, &inputs, ctx.variables)?;
        Ok(match serde_json::from_str(&rendered) {
          Ok(json) => json,
          Err(_) => Value::String(rendered),
        })
      }
      _ => Ok(Value::Object(inputs)),
    }
  }
}

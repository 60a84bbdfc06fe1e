//! Expression and template evaluation shared by condition and transform
//! nodes. Both see the node inputs as `input` and run variables as `vars`.

use minijinja::{Environment, Value as ExprValue, context};
use serde_json::{Map, Value};

use crate::error::HandlerError;

fn scope(inputs: &Map<String, Value>, variables: &Map<String, Value>) -> ExprValue {
  context! {
    input => inputs,
    vars => variables,
  }
}

fn expression_error(kind: &'static str, err: minijinja::Error) -> HandlerError {
  HandlerError::Expression {
    kind,
    message: err.to_string(),
  }
}

/// Evaluate `source` as an expression.
pub(super) fn evaluate(
  kind: &'static str,
  source: &str,
  inputs: &Map<String, Value>,
  variables: &Map<String, Value>,
) -> Result<ExprValue, HandlerError> {
  let env = Environment::new();
  let expr = env
    .compile_expression(source)
    .map_err(|e| expression_error(kind, e))?;
  expr
    .eval(scope(inputs, variables))
    .map_err(|e| expression_error(kind, e))
}

/// Render `source` as a template.
pub(super) fn render(
  kind: &'static str,
  source: &str,
  inputs: &Map<String, Value>,
  variables: &Map<String, Value>,
) -> Result<String, HandlerError> {
  let env = Environment::new();
  env
    .render_str(source, scope(inputs, variables))
    .map_err(|e| expression_error(kind, e))
}

/// Convert an evaluated expression back to JSON.
pub(super) fn to_json(kind: &'static str, value: &ExprValue) -> Result<Value, HandlerError> {
  serde_json::to_value(value).map_err(|e| HandlerError::Expression {
    kind,
    message: e.to_string(),
  })
}

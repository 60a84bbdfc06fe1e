//! Agent delegation: hands a node's payload to another agent through an
//! [`AgentMessenger`].

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use loom_config::Node;
use serde::{Deserialize, Serialize};
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use super::{HandlerContext, NodeHandler};
use crate::debug::engine_log;
use crate::error::HandlerError;

const DEFAULT_MESSAGE_TYPE: &str = "TASK_REQUEST";
const DEFAULT_PRIORITY: &str = "medium";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRY_COUNT: u64 = 3;

static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").unwrap());

/// Delivery options attached to an [`AgentMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
  pub priority: String,
  /// Milliseconds.
  pub timeout: u64,
  pub retry_count: u64,
}

/// A message sent to another agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
  #[serde(rename = "type")]
  pub message_type: String,
  pub sender: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recipient: Option<String>,
  pub payload: Value,
  pub metadata: MessageMetadata,
}

/// Messaging capability used by agent-delegate nodes.
///
/// Whatever the messenger returns becomes the node's output.
#[async_trait]
pub trait AgentMessenger: Send + Sync {
  /// Fire-and-forget delivery to `message.recipient`.
  async fn send_message(&self, message: AgentMessage) -> Result<Value, HandlerError>;

  /// Deliver and wait up to `timeout` for the recipient's reply.
  async fn send_request_and_wait_for_response(
    &self,
    message: AgentMessage,
    timeout: Duration,
  ) -> Result<Value, HandlerError>;

  /// Deliver to every agent.
  async fn broadcast_message(&self, message: AgentMessage) -> Result<Value, HandlerError>;
}

/// `agent-delegate` nodes.
///
/// `config.communicationPattern` is one of `broadcast`, `request-response`
/// or `direct` (the default). All but `broadcast` need `config.agentId`.
pub struct AgentDelegateHandler {
  messenger: Option<Arc<dyn AgentMessenger>>,
}

impl AgentDelegateHandler {
  pub fn new(messenger: Option<Arc<dyn AgentMessenger>>) -> Self {
    Self { messenger }
  }
}

#[async_trait]
impl NodeHandler for AgentDelegateHandler {
  async fn handle(
    &self,
    node: &Node,
    inputs: Map<String, Value>,
    ctx: HandlerContext<'_>,
  ) -> Result<Value, HandlerError> {
    let messenger = self
      .messenger
      .as_ref()
      .ok_or_else(|| HandlerError::Configuration("agent messenger not configured".to_string()))?;

    let pattern = node.config_str("communicationPattern").unwrap_or("direct");
    let agent_id = node.config_str("agentId").filter(|id| !id.is_empty());
    if agent_id.is_none() && pattern != "broadcast" {
      return Err(HandlerError::Configuration(
        "agent id is required for direct communication".to_string(),
      ));
    }

    let config = &node.data.config;
    let timeout = config
      .get("timeout")
      .and_then(Value::as_u64)
      .filter(|ms| *ms > 0)
      .unwrap_or(DEFAULT_TIMEOUT_MS);

    let payload = match node.config_str("payloadTemplate").filter(|t| !t.is_empty()) {
      Some(template) => match serde_json::from_str(&fill_template(template, &inputs)) {
        Ok(payload) => payload,
        Err(e) => {
          engine_log!(ctx, warn, node_id = %node.id, error = %e, "failed to parse payload template, sending inputs");
          Value::Object(inputs)
        }
      },
      None => Value::Object(inputs),
    };

    let message = AgentMessage {
      message_type: node
        .config_str("messageType")
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_MESSAGE_TYPE)
        .to_string(),
      sender: "workflow".to_string(),
      recipient: None,
      payload,
      metadata: MessageMetadata {
        priority: node
          .config_str("priority")
          .filter(|p| !p.is_empty())
          .unwrap_or(DEFAULT_PRIORITY)
          .to_string(),
        timeout,
        retry_count: config
          .get("retryCount")
          .and_then(Value::as_u64)
          .filter(|n| *n > 0)
          .unwrap_or(DEFAULT_RETRY_COUNT),
      },
    };

    match pattern {
      "broadcast" => messenger.broadcast_message(message).await,
      "request-response" => {
        let message = AgentMessage {
          recipient: agent_id.map(str::to_string),
          ..message
        };
        messenger
          .send_request_and_wait_for_response(message, Duration::from_millis(timeout))
          .await
      }
      _ => {
        let message = AgentMessage {
          recipient: agent_id.map(str::to_string),
          ..message
        };
        messenger.send_message(message).await
      }
    }
  }
}

/// Replace each `{{key}}` (word characters only) with the JSON encoding of
/// `inputs[key]`, or `null` when the key is missing or falsy.
fn fill_template(template: &str, inputs: &Map<String, Value>) -> String {
  PLACEHOLDER
    .replace_all(template, |caps: &Captures| {
      inputs
        .get(&caps[1])
        .filter(|v| is_truthy(v))
        .unwrap_or(&Value::Null)
        .to_string()
    })
    .into_owned()
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    Value::String(s) => !s.is_empty(),
    _ => true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Mutex;

  #[derive(Default)]
  struct RecordingMessenger {
    calls: Mutex<Vec<(&'static str, AgentMessage, Option<Duration>)>>,
  }

  #[async_trait]
  impl AgentMessenger for RecordingMessenger {
    async fn send_message(&self, message: AgentMessage) -> Result<Value, HandlerError> {
      self.calls.lock().unwrap().push(("direct", message, None));
      Ok(json!({"delivered": true}))
    }

    async fn send_request_and_wait_for_response(
      &self,
      message: AgentMessage,
      timeout: Duration,
    ) -> Result<Value, HandlerError> {
      self.calls.lock().unwrap().push(("request", message, Some(timeout)));
      Ok(json!({"reply": "ok"}))
    }

    async fn broadcast_message(&self, message: AgentMessage) -> Result<Value, HandlerError> {
      self.calls.lock().unwrap().push(("broadcast", message, None));
      Ok(json!({"broadcast": true}))
    }
  }

  async fn run(
    messenger: Option<Arc<RecordingMessenger>>,
    node: Node,
    inputs: Value,
  ) -> Result<Value, HandlerError> {
    let handler = AgentDelegateHandler::new(messenger.map(|m| m as Arc<dyn AgentMessenger>));
    let vars = Map::new();
    let ctx = HandlerContext::new("r", &vars);
    handler
      .handle(&node, inputs.as_object().cloned().unwrap_or_default(), ctx)
      .await
  }

  #[tokio::test]
  async fn test_missing_messenger_is_configuration_error() {
    let node = Node::new("a", "agent-delegate").with_config("agentId", json!("x"));
    let err = run(None, node, json!({})).await.unwrap_err();
    assert!(matches!(err, HandlerError::Configuration(_)));
  }

  #[tokio::test]
  async fn test_direct_requires_agent_id() {
    let messenger = Arc::new(RecordingMessenger::default());
    let err = run(Some(messenger.clone()), Node::new("a", "a2a"), json!({}))
      .await
      .unwrap_err();
    assert!(matches!(err, HandlerError::Configuration(_)));
    assert!(messenger.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_direct_message_defaults() {
    let messenger = Arc::new(RecordingMessenger::default());
    let node = Node::new("a", "agent-delegate").with_config("agentId", json!("planner"));
    let output = run(Some(messenger.clone()), node, json!({"q": 1})).await.unwrap();
    assert_eq!(output, json!({"delivered": true}));

    let calls = messenger.calls.lock().unwrap();
    let (pattern, message, _) = &calls[0];
    assert_eq!(*pattern, "direct");
    assert_eq!(message.recipient.as_deref(), Some("planner"));
    assert_eq!(message.message_type, "TASK_REQUEST");
    assert_eq!(message.sender, "workflow");
    assert_eq!(message.payload, json!({"q": 1}));
    assert_eq!(
      message.metadata,
      MessageMetadata {
        priority: "medium".to_string(),
        timeout: 30_000,
        retry_count: 3,
      }
    );
  }

  #[tokio::test]
  async fn test_request_response_passes_timeout() {
    let messenger = Arc::new(RecordingMessenger::default());
    let node = Node::new("a", "agent-delegate")
      .with_config("agentId", json!("planner"))
      .with_config("communicationPattern", json!("request-response"))
      .with_config("timeout", json!(500));
    run(Some(messenger.clone()), node, json!({})).await.unwrap();

    let calls = messenger.calls.lock().unwrap();
    assert_eq!(calls[0].0, "request");
    assert_eq!(calls[0].2, Some(Duration::from_millis(500)));
    assert_eq!(calls[0].1.metadata.timeout, 500);
  }

  #[tokio::test]
  async fn test_broadcast_needs_no_agent_id() {
    let messenger = Arc::new(RecordingMessenger::default());
    let node = Node::new("a", "agent-delegate").with_config("communicationPattern", json!("broadcast"));
    run(Some(messenger.clone()), node, json!({})).await.unwrap();

    let calls = messenger.calls.lock().unwrap();
    assert_eq!(calls[0].0, "broadcast");
    assert!(calls[0].1.recipient.is_none());
  }

  #[tokio::test]
  async fn test_payload_template() {
    let messenger = Arc::new(RecordingMessenger::default());
    let node = Node::new("a", "agent-delegate")
      .with_config("agentId", json!("planner"))
      .with_config("payloadTemplate", json!(r#"{"task": {{input}}, "missing": {{nope}}}"#));
    run(Some(messenger.clone()), node, json!({"input": {"x": 1}})).await.unwrap();

    let calls = messenger.calls.lock().unwrap();
    assert_eq!(calls[0].1.payload, json!({"task": {"x": 1}, "missing": null}));
  }

  #[tokio::test]
  async fn test_unparseable_template_falls_back_to_inputs() {
    let messenger = Arc::new(RecordingMessenger::default());
    let node = Node::new("a", "agent-delegate")
      .with_config("agentId", json!("planner"))
      .with_config("payloadTemplate", json!("not json {{input}}"));
    run(Some(messenger.clone()), node, json!({"input": 1})).await.unwrap();

    let calls = messenger.calls.lock().unwrap();
    assert_eq!(calls[0].1.payload, json!({"input": 1}));
  }

  #[test]
  fn test_fill_template_leaves_non_placeholders() {
    let inputs = Map::new();
    assert_eq!(fill_template("{{ a }} {{}} {{b", &inputs), "{{ a }} {{}} {{b");
    assert_eq!(fill_template("[{{a}}]", &inputs), "[null]");
  }

  #[test]
  fn test_fill_template_extra_braces() {
    let inputs = json!({"a": 1, "b": "x"}).as_object().cloned().unwrap();
    assert_eq!(fill_template("{{{a}}}", &inputs), "{1}");
    assert_eq!(fill_template("{{{{b}}", &inputs), "{{\"x\"");
    assert_eq!(fill_template("{{a}}{{b}}", &inputs), "1\"x\"");
  }

  #[test]
  fn test_fill_template_falsy_is_null() {
    let inputs = json!({"zero": 0, "empty": "", "no": false, "list": []}).as_object().cloned().unwrap();
    assert_eq!(
      fill_template("{{zero}} {{empty}} {{no}} {{list}}", &inputs),
      "null null null []"
    );
  }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What to do with a node failure once retries (if any) are not configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBehavior {
  /// Fail the run.
  #[default]
  Stop,
  /// Log the failure and move on to the next node.
  Continue,
}

/// Per-node failure handling, read from the node's `retryPolicy` config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
  #[serde(default)]
  pub max_retries: u32,
  #[serde(default = "default_backoff_ms")]
  pub backoff_ms: u64,
  #[serde(default)]
  pub error_behavior: ErrorBehavior,
}

fn default_backoff_ms() -> u64 {
  1000
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 0,
      backoff_ms: default_backoff_ms(),
      error_behavior: ErrorBehavior::Stop,
    }
  }
}

impl RetryPolicy {
  /// Read the policy from a node configuration map.
  pub fn from_config(config: &Map<String, Value>) -> Self {
    config
      .get("retryPolicy")
      .and_then(|value| serde_json::from_value(value.clone()).ok())
      .unwrap_or_default()
  }

  /// Delay before the zero-indexed retry `attempt`: `backoff_ms * 2^attempt`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(self.backoff_ms.saturating_mul(factor))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_missing_policy_uses_defaults() {
    let policy = RetryPolicy::from_config(&Map::new());
    assert_eq!(policy, RetryPolicy::default());
    assert_eq!(policy.backoff_ms, 1000);
  }

  #[test]
  fn test_policy_parses_camel_case() {
    let config = json!({
      "retryPolicy": { "maxRetries": 3, "backoffMs": 50, "errorBehavior": "continue" }
    });
    let policy = RetryPolicy::from_config(config.as_object().unwrap());
    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.backoff_ms, 50);
    assert_eq!(policy.error_behavior, ErrorBehavior::Continue);
  }

  #[test]
  fn test_malformed_policy_falls_back() {
    let config = json!({ "retryPolicy": "three times" });
    let policy = RetryPolicy::from_config(config.as_object().unwrap());
    assert_eq!(policy, RetryPolicy::default());
  }

  #[test]
  fn test_backoff_doubles_per_attempt() {
    let policy = RetryPolicy {
      backoff_ms: 100,
      ..Default::default()
    };
    assert_eq!(policy.backoff(0), Duration::from_millis(100));
    assert_eq!(policy.backoff(1), Duration::from_millis(200));
    assert_eq!(policy.backoff(3), Duration::from_millis(800));
  }
}

//! What the sequential strategy does after a node fails.

use loom_config::{ErrorBehavior, RetryPolicy};

/// Reaction to a failed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureAction {
  /// Re-run up to this many more times, then fail the run.
  Retry(u32),
  /// Keep the failure result and move on to the next node.
  Continue,
  /// Fail the run now.
  Propagate,
}

impl FailureAction {
  /// Retries take precedence over `errorBehavior: continue`.
  pub fn for_policy(policy: &RetryPolicy) -> Self {
    if policy.max_retries > 0 {
      FailureAction::Retry(policy.max_retries)
    } else if policy.error_behavior == ErrorBehavior::Continue {
      FailureAction::Continue
    } else {
      FailureAction::Propagate
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_policy_propagates() {
    assert_eq!(FailureAction::for_policy(&RetryPolicy::default()), FailureAction::Propagate);
  }

  #[test]
  fn test_retries_win_over_continue() {
    let policy = RetryPolicy {
      max_retries: 2,
      error_behavior: ErrorBehavior::Continue,
      ..Default::default()
    };
    assert_eq!(FailureAction::for_policy(&policy), FailureAction::Retry(2));
  }

  #[test]
  fn test_continue() {
    let policy = RetryPolicy {
      error_behavior: ErrorBehavior::Continue,
      ..Default::default()
    };
    assert_eq!(FailureAction::for_policy(&policy), FailureAction::Continue);
  }
}

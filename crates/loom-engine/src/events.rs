//! Execution events and subscriber lists for observability.
//!
//! Events are emitted during workflow execution to allow consumers to observe
//! progress, persist state, stream to UIs, etc. An [`EventBus`] fans every
//! emitted value out to its current subscribers synchronously and in emission
//! order; late subscribers do not see earlier events.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Lifecycle state carried by an [`ExecutionUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
  Started,
  Running,
  Completed,
  Failed,
  Aborted,
}

/// A run or node lifecycle event.
///
/// Events without `node_id` describe the run itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUpdate {
  #[serde(rename = "executionId")]
  pub run_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  pub state: ExecutionState,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Value>,
  /// Milliseconds since the Unix epoch.
  pub timestamp: i64,
}

impl ExecutionUpdate {
  pub(crate) fn run(run_id: &str, state: ExecutionState, message: impl Into<String>) -> Self {
    Self {
      run_id: run_id.to_string(),
      node_id: None,
      state,
      message: message.into(),
      result: None,
      timestamp: now_millis(),
    }
  }

  pub(crate) fn node(
    run_id: &str,
    node_id: &str,
    state: ExecutionState,
    message: impl Into<String>,
  ) -> Self {
    Self {
      node_id: Some(node_id.to_string()),
      ..Self::run(run_id, state, message)
    }
  }

  pub(crate) fn with_result(mut self, result: serde_json::Value) -> Self {
    self.result = Some(result);
    self
  }
}

pub(crate) fn now_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

/// Trait for receiving published values.
///
/// Implemented for any `Fn(&T)` closure, so most subscribers are closures.
pub trait ExecutionNotifier<T>: Send + Sync {
  /// Called for each published value.
  fn notify(&self, event: &T);
}

impl<T, F> ExecutionNotifier<T> for F
where
  F: Fn(&T) + Send + Sync,
{
  fn notify(&self, event: &T) {
    self(event)
  }
}

/// A notifier that forwards values to an unbounded channel.
///
/// Use this when events must be consumed asynchronously (persist to a
/// database, stream to a UI over a socket, etc.).
#[derive(Debug, Clone)]
pub struct ChannelNotifier<T> {
  // Unbounded so that a slow consumer never blocks the engine. Volume is a
  // handful of events per node.
  sender: mpsc::UnboundedSender<T>,
}

impl<T> ChannelNotifier<T> {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<T>) -> Self {
    Self { sender }
  }
}

impl<T: Clone + Send> ExecutionNotifier<T> for ChannelNotifier<T> {
  fn notify(&self, event: &T) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event.clone());
  }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscribers<T> {
  next_id: u64,
  entries: Vec<(SubscriptionId, Arc<dyn ExecutionNotifier<T>>)>,
}

/// An observer list with synchronous fan-out.
pub struct EventBus<T> {
  subscribers: Mutex<Subscribers<T>>,
}

impl<T> Default for EventBus<T> {
  fn default() -> Self {
    Self {
      subscribers: Mutex::new(Subscribers {
        next_id: 0,
        entries: Vec::new(),
      }),
    }
  }
}

impl<T: Clone + Send + 'static> EventBus<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a subscriber. It receives every value emitted from now on.
  pub fn subscribe(&self, notifier: impl ExecutionNotifier<T> + 'static) -> SubscriptionId {
    let mut subscribers = self.subscribers.lock().unwrap();
    let id = SubscriptionId(subscribers.next_id);
    subscribers.next_id += 1;
    subscribers.entries.push((id, Arc::new(notifier)));
    id
  }

  /// Subscribe through an unbounded channel.
  pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let id = self.subscribe(ChannelNotifier::new(sender));
    (id, receiver)
  }

  /// Remove a subscriber. Returns `false` if it was not registered.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut subscribers = self.subscribers.lock().unwrap();
    let before = subscribers.entries.len();
    subscribers.entries.retain(|(entry_id, _)| *entry_id != id);
    subscribers.entries.len() != before
  }

  /// Deliver `event` to every current subscriber.
  pub fn emit(&self, event: &T) {
    // Snapshot first so subscribers may (un)subscribe from inside `notify`.
    let entries: Vec<Arc<dyn ExecutionNotifier<T>>> = {
      let subscribers = self.subscribers.lock().unwrap();
      subscribers
        .entries
        .iter()
        .map(|(_, notifier)| notifier.clone())
        .collect()
    };
    for notifier in entries {
      notifier.notify(event);
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().unwrap().entries.len()
  }
}

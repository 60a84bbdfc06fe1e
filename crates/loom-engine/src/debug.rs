//! Debug controls: breakpoints, step-by-step pausing and the engine log level.

use std::sync::{Mutex, RwLock};

use loom_config::{DebugOptions, DebugOptionsUpdate, LogLevel};
use tokio::sync::oneshot;

/// Emits a tracing event only when the engine's configured [`LogLevel`]
/// allows it.
macro_rules! engine_log {
  ($debug:expr, error, $($arg:tt)+) => {
    if $debug.logs(loom_config::LogLevel::Error) { ::tracing::error!($($arg)+) }
  };
  ($debug:expr, warn, $($arg:tt)+) => {
    if $debug.logs(loom_config::LogLevel::Warn) { ::tracing::warn!($($arg)+) }
  };
  ($debug:expr, info, $($arg:tt)+) => {
    if $debug.logs(loom_config::LogLevel::Info) { ::tracing::info!($($arg)+) }
  };
  ($debug:expr, debug, $($arg:tt)+) => {
    if $debug.logs(loom_config::LogLevel::Debug) { ::tracing::debug!($($arg)+) }
  };
}

pub(crate) use engine_log;

/// Holds the current [`DebugOptions`] and the single outstanding resume
/// signal for a paused run.
///
/// Only one pause can be outstanding at a time. A second pause replaces the
/// first resume slot, which releases the earlier waiter.
#[derive(Debug, Default)]
pub struct DebugController {
  options: RwLock<DebugOptions>,
  resume: Mutex<Option<oneshot::Sender<()>>>,
}

impl DebugController {
  pub fn new(options: DebugOptions) -> Self {
    Self {
      options: RwLock::new(options),
      resume: Mutex::new(None),
    }
  }

  /// Current options snapshot.
  pub fn options(&self) -> DebugOptions {
    self.options.read().unwrap().clone()
  }

  /// Merge a partial update into the current options.
  pub fn set_options(&self, update: DebugOptionsUpdate) {
    self.options.write().unwrap().apply(update);
  }

  pub fn log_level(&self) -> LogLevel {
    self.options.read().unwrap().log_level
  }

  /// Whether a message at `level` passes the configured log level.
  pub fn logs(&self, level: LogLevel) -> bool {
    self.log_level().allows(level)
  }

  /// Whether a run is currently waiting on [`DebugController::resume`].
  pub fn is_paused(&self) -> bool {
    self
      .resume
      .lock()
      .unwrap()
      .as_ref()
      .is_some_and(|sender| !sender.is_closed())
  }

  /// Suspend until resumed if debugging says `node_id` should pause.
  ///
  /// Returns `true` if the caller actually paused.
  pub async fn maybe_pause(&self, node_id: &str) -> bool {
    let should_pause = self.options.read().unwrap().should_pause(node_id);
    if !should_pause {
      return false;
    }

    let (sender, receiver) = oneshot::channel();
    *self.resume.lock().unwrap() = Some(sender);
    engine_log!(self, info, node_id = %node_id, "execution paused");

    // A dropped sender also resumes.
    let _ = receiver.await;
    true
  }

  /// Resume a paused run. No-op returning `false` when nothing is paused.
  pub fn resume(&self) -> bool {
    let sender = self.resume.lock().unwrap().take();
    match sender {
      Some(sender) => sender.send(()).is_ok(),
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  fn breakpoint_on(node_id: &str) -> DebugOptions {
    DebugOptions {
      enabled: true,
      breakpoints: vec![node_id.to_string()],
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn test_no_pause_when_disabled() {
    let controller = DebugController::default();
    assert!(!controller.maybe_pause("a").await);
  }

  #[tokio::test]
  async fn test_resume_without_pause_is_noop() {
    let controller = DebugController::default();
    assert!(!controller.resume());
    assert!(!controller.is_paused());
  }

  #[tokio::test]
  async fn test_breakpoint_pauses_until_resumed() {
    let controller = Arc::new(DebugController::new(breakpoint_on("b")));

    let paused = {
      let controller = controller.clone();
      tokio::spawn(async move { controller.maybe_pause("b").await })
    };

    while !controller.is_paused() {
      tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(!paused.is_finished());
    assert!(controller.resume());
    assert!(paused.await.unwrap());
    assert!(!controller.is_paused());
  }

  #[test]
  fn test_set_options_merges_update() {
    let controller = DebugController::default();
    controller.set_options(DebugOptionsUpdate {
      log_level: Some(LogLevel::Error),
      ..Default::default()
    });

    assert!(controller.logs(LogLevel::Error));
    assert!(!controller.logs(LogLevel::Warn));
    assert!(!controller.options().enabled);
  }
}

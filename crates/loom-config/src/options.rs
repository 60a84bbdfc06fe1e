use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptions {
  /// Execute independent nodes concurrently.
  #[serde(default)]
  pub parallel: bool,
  /// Upper bound for the whole run.
  #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Values exposed to condition and transform expressions as `vars`.
  #[serde(default)]
  pub variables: Map<String, Value>,
}

impl ExecutionOptions {
  pub fn parallel() -> Self {
    Self {
      parallel: true,
      ..Default::default()
    }
  }
}

/// Minimum severity the engine emits, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Error,
  Warn,
  #[default]
  Info,
  Debug,
  Trace,
}

impl LogLevel {
  /// Whether a message at `level` passes this threshold.
  pub fn allows(self, level: LogLevel) -> bool {
    level <= self
  }
}

impl std::str::FromStr for LogLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "error" => Ok(LogLevel::Error),
      "warn" => Ok(LogLevel::Warn),
      "info" => Ok(LogLevel::Info),
      "debug" => Ok(LogLevel::Debug),
      "trace" => Ok(LogLevel::Trace),
      other => Err(format!("unknown log level '{other}'")),
    }
  }
}

/// Debugger configuration shared by all runs of one engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugOptions {
  #[serde(default)]
  pub enabled: bool,
  /// Pause before every node.
  #[serde(default)]
  pub step_by_step: bool,
  /// Node ids to pause before.
  #[serde(default)]
  pub breakpoints: Vec<String>,
  #[serde(default)]
  pub log_level: LogLevel,
}

impl DebugOptions {
  /// Whether execution should pause before `node_id`.
  pub fn should_pause(&self, node_id: &str) -> bool {
    self.enabled && (self.step_by_step || self.breakpoints.iter().any(|b| b == node_id))
  }

  /// Overwrite the fields that are set in `update`.
  pub fn apply(&mut self, update: DebugOptionsUpdate) {
    if let Some(enabled) = update.enabled {
      self.enabled = enabled;
    }
    if let Some(step_by_step) = update.step_by_step {
      self.step_by_step = step_by_step;
    }
    if let Some(breakpoints) = update.breakpoints {
      self.breakpoints = breakpoints;
    }
    if let Some(log_level) = update.log_level {
      self.log_level = log_level;
    }
  }
}

/// Partial [`DebugOptions`]; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugOptionsUpdate {
  pub enabled: Option<bool>,
  pub step_by_step: Option<bool>,
  pub breakpoints: Option<Vec<String>>,
  pub log_level: Option<LogLevel>,
}

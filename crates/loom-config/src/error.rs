use std::path::PathBuf;

/// Errors raised while loading workflow documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read workflow file '{}'", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse workflow definition: {0}")]
  Parse(#[from] serde_json::Error),
}

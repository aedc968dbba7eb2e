use houdin_registry::ValidationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("already exists: {0}")]
  Duplicate(String),

  #[error("unknown credential type: {0}")]
  UnknownCredentialType(String),

  #[error("invalid credential configuration: {0}")]
  InvalidCredential(#[from] ValidationErrors),

  #[error("storage error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Pull or push failed. The outbox is left intact.
  #[error("remote error: {0}")]
  Remote(String),
}

impl From<reqwest::Error> for StoreError {
  fn from(err: reqwest::Error) -> Self {
    StoreError::Remote(err.to_string())
  }
}

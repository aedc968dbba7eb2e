use houdin_registry::{RegistryError, ValidationErrors};
use houdin_runtime::PageError;
use houdin_workflow::WorkflowError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TriggerError {
  #[error("invalid trigger configuration: {0}")]
  InvalidConfig(#[from] ValidationErrors),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error("trigger setup failed: {0}")]
  Setup(String),
}

impl From<PageError> for TriggerError {
  fn from(err: PageError) -> Self {
    TriggerError::Setup(err.to_string())
  }
}

impl TriggerError {
  pub(crate) fn invalid_config(property: &str, message: impl Into<String>) -> Self {
    let mut errors = ValidationErrors::new();
    errors.add(property, message);
    TriggerError::InvalidConfig(errors)
  }
}

use std::time::Duration;

use houdin_bridge::BridgeError;
use houdin_registry::{RegistryError, ValidationErrors};
use houdin_workflow::WorkflowError;
use thiserror::Error;

use crate::page::PageError;

/// Message fragments that identify a Content-Security-Policy refusal.
const CSP_MARKERS: [&str; 3] = ["Content Security Policy", "unsafe-eval", "EvalError"];

/// Terminal failure of a single action.
///
/// Halts the failing branch only; sibling branches keep running.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
  /// The interpolated config does not satisfy the action's schema.
  #[error("{0}")]
  ConfigValidation(ValidationErrors),

  #[error("element not found: {selector}")]
  ElementNotFound { selector: String },

  #[error("{0}")]
  Network(String),

  #[error("{0}")]
  Timeout(String),

  #[error("script injection failed: {0}")]
  ScriptInjection(String),

  /// The page's Content-Security-Policy blocked script evaluation.
  #[error("blocked by the page's Content Security Policy: {0}")]
  CspViolation(String),

  /// An interactive prompt was not answered in time.
  #[error("no response after {0:?}")]
  ModalTimeout(Duration),

  #[error("cancelled")]
  Cancelled,

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("{0}")]
  Failed(String),
}

impl ActionError {
  /// Classify a script failure, separating CSP refusals from other errors.
  pub fn script(message: impl Into<String>) -> Self {
    let message = message.into();
    if is_csp_violation(&message) {
      ActionError::CspViolation(message)
    } else {
      ActionError::ScriptInjection(message)
    }
  }

  /// A single config problem, keyed by property.
  pub fn invalid_config(property: &str, message: impl Into<String>) -> Self {
    let mut errors = ValidationErrors::new();
    errors.add(property, message);
    ActionError::ConfigValidation(errors)
  }
}

pub fn is_csp_violation(message: &str) -> bool {
  CSP_MARKERS.iter().any(|marker| message.contains(marker))
}

impl From<ValidationErrors> for ActionError {
  fn from(errors: ValidationErrors) -> Self {
    ActionError::ConfigValidation(errors)
  }
}

impl From<BridgeError> for ActionError {
  fn from(err: BridgeError) -> Self {
    match err {
      BridgeError::Network(message) => ActionError::Network(message),
      BridgeError::Timeout(message) => ActionError::Timeout(message),
      BridgeError::Script(message) => ActionError::script(message),
      BridgeError::Cancelled => ActionError::Cancelled,
      other => ActionError::Failed(other.to_string()),
    }
  }
}

impl From<PageError> for ActionError {
  fn from(err: PageError) -> Self {
    match err {
      PageError::ElementNotFound { selector } => ActionError::ElementNotFound { selector },
      PageError::Unavailable(message) => ActionError::Failed(message),
    }
  }
}

/// Errors that prevent an execution from starting.
#[derive(Debug, Error, PartialEq)]
pub enum ExecutionError {
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[error("node '{0}' is not a trigger")]
  NotATrigger(String),

  #[error("workflow '{0}' is disabled")]
  WorkflowDisabled(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_csp_classification() {
    assert!(matches!(
      ActionError::script("Refused to evaluate a string as JavaScript because 'unsafe-eval' is not an allowed source"),
      ActionError::CspViolation(_)
    ));
    assert!(matches!(
      ActionError::script("EvalError: call to eval() blocked by CSP"),
      ActionError::CspViolation(_)
    ));
    assert!(matches!(
      ActionError::script("ReferenceError: foo is not defined"),
      ActionError::ScriptInjection(_)
    ));
  }

  #[test]
  fn test_bridge_errors_keep_message() {
    let err: ActionError = BridgeError::Network("connection reset by peer".to_string()).into();
    assert_eq!(err.to_string(), "connection reset by peer");

    let err: ActionError = BridgeError::Script("violates the following Content Security Policy directive".to_string()).into();
    assert!(matches!(err, ActionError::CspViolation(_)));
  }
}

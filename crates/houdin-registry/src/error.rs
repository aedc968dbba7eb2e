use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors that can occur when working with a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
  /// No descriptor registered under this type id.
  #[error("type not registered: {type_id}")]
  NotFound { type_id: String },
}

/// Schema violations keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
  errors: BTreeMap<String, String>,
}

impl ValidationErrors {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, property: impl Into<String>, message: impl Into<String>) {
    self.errors.insert(property.into(), message.into());
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn len(&self) -> usize {
    self.errors.len()
  }

  /// Message for a property, if it failed.
  pub fn get(&self, property: &str) -> Option<&str> {
    self.errors.get(property).map(String::as_str)
  }

  pub fn into_map(self) -> BTreeMap<String, String> {
    self.errors
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .errors
      .iter()
      .map(|(key, msg)| format!("{}: {}", key, msg))
      .collect();
    write!(f, "invalid configuration ({})", parts.join("; "))
  }
}

impl std::error::Error for ValidationErrors {}

use serde::{Deserialize, Serialize};

/// Handle a node emits on when it does not pick one explicitly.
pub const DEFAULT_OUTPUT_HANDLE: &str = "output";

/// Handle a connection targets when none is given.
pub const DEFAULT_INPUT_HANDLE: &str = "input";

/// A directed edge from an output handle of one node to an input handle of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConnection {
  pub id: String,
  pub source: String,
  #[serde(default = "default_source_handle")]
  pub source_handle: String,
  pub target: String,
  #[serde(default = "default_target_handle")]
  pub target_handle: String,
}

impl WorkflowConnection {
  /// Connection on the default `output` -> `input` handles.
  pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      source: source.into(),
      source_handle: DEFAULT_OUTPUT_HANDLE.to_string(),
      target: target.into(),
      target_handle: DEFAULT_INPUT_HANDLE.to_string(),
    }
  }

  /// Same connection, leaving `source` on a named handle (e.g. `"true"`).
  pub fn on_handle(mut self, handle: impl Into<String>) -> Self {
    self.source_handle = handle.into();
    self
  }
}

fn default_source_handle() -> String {
  DEFAULT_OUTPUT_HANDLE.to_string()
}

fn default_target_handle() -> String {
  DEFAULT_INPUT_HANDLE.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_handles_default_when_missing() {
    let conn: WorkflowConnection =
      serde_json::from_str(r#"{"id":"c1","source":"a","target":"b"}"#).unwrap();
    assert_eq!(conn.source_handle, "output");
    assert_eq!(conn.target_handle, "input");
  }

  #[test]
  fn test_on_handle() {
    let conn = WorkflowConnection::new("c1", "if", "yes").on_handle("true");
    assert_eq!(conn.source_handle, "true");
    assert_eq!(conn.target, "yes");
  }
}

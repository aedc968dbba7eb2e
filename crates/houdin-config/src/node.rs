use serde::{Deserialize, Serialize};

/// Whether a node starts executions or performs work inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Trigger,
  Action,
}

/// Designer canvas coordinates. Carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

/// Registry key plus the raw (uninterpolated) configuration of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
  /// Key into the trigger or action registry, e.g. `"http-request"`.
  #[serde(rename = "type")]
  pub type_id: String,
  #[serde(default)]
  pub config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
  #[serde(default)]
  pub position: Position,
  pub data: NodeData,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inputs: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub outputs: Option<Vec<String>>,
}

impl WorkflowNode {
  pub fn trigger(
    id: impl Into<String>,
    type_id: impl Into<String>,
    config: serde_json::Value,
  ) -> Self {
    Self::build(id.into(), NodeKind::Trigger, type_id.into(), config)
  }

  pub fn action(
    id: impl Into<String>,
    type_id: impl Into<String>,
    config: serde_json::Value,
  ) -> Self {
    Self::build(id.into(), NodeKind::Action, type_id.into(), config)
  }

  fn build(id: String, kind: NodeKind, type_id: String, config: serde_json::Value) -> Self {
    let config = match config {
      serde_json::Value::Object(map) => map,
      _ => serde_json::Map::new(),
    };
    Self {
      id,
      kind,
      position: Position::default(),
      data: NodeData { type_id, config },
      inputs: None,
      outputs: None,
    }
  }

  pub fn is_trigger(&self) -> bool {
    self.kind == NodeKind::Trigger
  }
}

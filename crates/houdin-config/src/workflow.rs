use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::connection::WorkflowConnection;
use crate::node::WorkflowNode;

/// A named, URL-scoped graph of trigger and action nodes.
///
/// `id` is immutable once created. `url_pattern` is a `*` glob matched against
/// the active tab URL to decide whether the triggers of this workflow are live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub url_pattern: String,
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  #[serde(default)]
  pub nodes: Vec<WorkflowNode>,
  #[serde(default)]
  pub connections: Vec<WorkflowConnection>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub variables: HashMap<String, String>,
  /// Last local modification, Unix millis.
  #[serde(default)]
  pub modified_at: i64,
}

impl WorkflowDefinition {
  /// Get a node by ID.
  pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// All trigger nodes; each is an independent entry point.
  pub fn trigger_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
    self.nodes.iter().filter(|n| n.is_trigger())
  }
}

fn default_enabled() -> bool {
  true
}

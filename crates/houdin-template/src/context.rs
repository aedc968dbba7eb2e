use std::collections::HashMap;

use serde_json::{Map, Value};

/// Read-only snapshot of everything a placeholder may reference.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
  nodes: Map<String, Value>,
  prev: Option<Value>,
  env: Map<String, Value>,
  meta: Map<String, Value>,
}

impl TemplateContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_node(mut self, node_id: impl Into<String>, output: Value) -> Self {
    self.nodes.insert(node_id.into(), output);
    self
  }

  pub fn with_nodes<'a>(mut self, outputs: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Self {
    for (id, output) in outputs {
      self.nodes.insert(id.clone(), output.clone());
    }
    self
  }

  pub fn with_prev(mut self, output: Value) -> Self {
    self.prev = Some(output);
    self
  }

  pub fn with_env(mut self, variables: &HashMap<String, String>) -> Self {
    for (name, value) in variables {
      self.env.insert(name.clone(), Value::String(value.clone()));
    }
    self
  }

  pub fn with_env_value(mut self, name: impl Into<String>, value: Value) -> Self {
    self.env.insert(name.into(), value);
    self
  }

  pub fn with_meta(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.meta.insert(field.into(), value.into());
    self
  }

  /// Root object the expressions are evaluated against.
  ///
  /// Node ids are exposed both at the top level and under `nodes`; the
  /// reserved namespaces take precedence over a node with the same id.
  pub(crate) fn to_root(&self) -> Value {
    let mut root = self.nodes.clone();
    root.insert("nodes".to_string(), Value::Object(self.nodes.clone()));
    root.insert("env".to_string(), Value::Object(self.env.clone()));
    root.insert("meta".to_string(), Value::Object(self.meta.clone()));
    match &self.prev {
      Some(prev) => {
        root.insert("prev".to_string(), prev.clone());
      }
      None => {
        root.remove("prev");
      }
    }
    Value::Object(root)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_root_exposes_all_namespaces() {
    let mut vars = HashMap::new();
    vars.insert("token".to_string(), "abc".to_string());

    let root = TemplateContext::new()
      .with_node("fetch", json!({ "ok": true }))
      .with_prev(json!({ "ok": true }))
      .with_env(&vars)
      .with_meta("url", "https://example.com")
      .to_root();

    assert_eq!(root["fetch"]["ok"], true);
    assert_eq!(root["nodes"]["fetch"]["ok"], true);
    assert_eq!(root["prev"]["ok"], true);
    assert_eq!(root["env"]["token"], "abc");
    assert_eq!(root["meta"]["url"], "https://example.com");
  }

  #[test]
  fn test_reserved_names_shadow_node_ids() {
    let root = TemplateContext::new()
      .with_node("env", json!("node output"))
      .to_root();
    assert_eq!(root["env"], json!({}));
    assert_eq!(root["nodes"]["env"], "node output");
  }
}

use std::collections::HashMap;

use houdin_template::TemplateContext;
use serde::Serialize;
use serde_json::Value;

/// Facts about the firing, exposed to templates as `meta`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMeta {
  pub url: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tab_id: Option<u32>,
  /// Unix millis at which the trigger fired.
  pub timestamp: i64,
  pub workflow_id: String,
  pub execution_id: String,
  pub trigger_node_id: String,
}

/// Per-firing scope: resolved node outputs, workflow variables, and metadata.
///
/// Owned by exactly one execution. Two firings of the same trigger get two
/// independent contexts.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
  outputs: HashMap<String, Value>,
  variables: HashMap<String, String>,
  meta: ExecutionMeta,
}

impl ExecutionContext {
  pub fn new(variables: HashMap<String, String>, meta: ExecutionMeta) -> Self {
    Self {
      outputs: HashMap::new(),
      variables,
      meta,
    }
  }

  pub fn meta(&self) -> &ExecutionMeta {
    &self.meta
  }

  pub fn output(&self, node_id: &str) -> Option<&Value> {
    self.outputs.get(node_id)
  }

  pub fn outputs(&self) -> &HashMap<String, Value> {
    &self.outputs
  }

  pub fn set_output(&mut self, node_id: impl Into<String>, output: Value) {
    self.outputs.insert(node_id.into(), output);
  }

  pub fn variables(&self) -> &HashMap<String, String> {
    &self.variables
  }

  /// Snapshot for interpolating one node's config.
  ///
  /// `prev` is the output of the predecessor that scheduled the node.
  pub fn template_context(&self, prev: Option<&Value>) -> TemplateContext {
    let mut ctx = TemplateContext::new()
      .with_nodes(self.outputs.iter())
      .with_env(&self.variables);

    if let Ok(Value::Object(meta)) = serde_json::to_value(&self.meta) {
      for (field, value) in meta {
        ctx = ctx.with_meta(field, value);
      }
    }

    if let Some(prev) = prev {
      ctx = ctx.with_prev(prev.clone());
    }
    ctx
  }
}

use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVariableConfig {
  pub name: String,
  #[serde(default)]
  pub value: Value,
}

/// Names a value for downstream nodes.
///
/// A string that parses as JSON is stored parsed, so `"[1,2]"` becomes an
/// array and `"42"` a number.
pub struct CreateVariableAction;

#[async_trait]
impl TypedAction for CreateVariableAction {
  type Config = CreateVariableConfig;

  async fn run(&self, config: CreateVariableConfig, _ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let value = match config.value {
      Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
      other => other,
    };
    Ok(ActionOutput::new(json!({ "name": config.name, "value": value })))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("create-variable", "Create Variable", "variable", "Store a value under a name"),
    ConfigSchema::new()
      .property("name", PropertyDescriptor::text("Name").required())
      .property("value", PropertyDescriptor::textarea("Value")),
    json!({ "name": "total", "value": 42 }),
    || Box::new(CreateVariableAction),
  )
}

use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};

use super::text_of;
use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageOperation {
  Get,
  Set,
  Remove,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
  pub operation: StorageOperation,
  pub key: String,
  #[serde(default)]
  pub value: Value,
}

/// Reads and writes the page's `localStorage`.
pub struct LocalStorageAction;

#[async_trait]
impl TypedAction for LocalStorageAction {
  type Config = LocalStorageConfig;

  async fn run(&self, config: LocalStorageConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let value = match config.operation {
      StorageOperation::Get => ctx.page.storage_get(&config.key).await.map(Value::String),
      StorageOperation::Set => {
        let value = text_of(&config.value);
        ctx.page.storage_set(&config.key, Some(value.clone())).await;
        Some(Value::String(value))
      }
      StorageOperation::Remove => {
        ctx.page.storage_set(&config.key, None).await;
        None
      }
    };
    Ok(ActionOutput::new(json!({
      "key": config.key,
      "value": value.unwrap_or(Value::Null),
    })))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("local-storage", "Local Storage", "database", "Read or write page localStorage"),
    ConfigSchema::new()
      .property(
        "operation",
        PropertyDescriptor::select("Operation", ["get", "set", "remove"])
          .required()
          .default_value("get"),
      )
      .property("key", PropertyDescriptor::text("Key").required())
      .property(
        "value",
        PropertyDescriptor::textarea("Value").required().show_when("operation", "set"),
      ),
    json!({ "key": "token", "value": "abc" }),
    || Box::new(LocalStorageAction),
  )
}

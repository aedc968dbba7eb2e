use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::json;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;
use crate::page::Modal;

#[derive(Debug, Clone, Deserialize)]
pub struct ShowModalConfig {
  #[serde(default)]
  pub title: String,
  pub content: String,
}

/// Displays content in a modal over the page.
pub struct ShowModalAction;

#[async_trait]
impl TypedAction for ShowModalAction {
  type Config = ShowModalConfig;

  async fn run(&self, config: ShowModalConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    ctx
      .page
      .show_modal(Modal {
        title: config.title.clone(),
        content: config.content.clone(),
      })
      .await?;
    Ok(ActionOutput::new(
      json!({ "title": config.title, "content": config.content }),
    ))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("show-modal", "Show Modal", "app-window", "Display content in a modal"),
    ConfigSchema::new()
      .property("title", PropertyDescriptor::text("Title"))
      .property("content", PropertyDescriptor::textarea("Content").required()),
    json!({ "title": "Result", "content": "1.2.3.4" }),
    || Box::new(ShowModalAction),
  )
}

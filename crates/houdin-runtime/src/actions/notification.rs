use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::json;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;
use crate::page::{Notification, NotificationLevel};

#[derive(Debug, Clone, Deserialize)]
pub struct ShowNotificationConfig {
  #[serde(default)]
  pub title: String,
  pub message: String,
  #[serde(default = "default_level")]
  pub level: NotificationLevel,
}

fn default_level() -> NotificationLevel {
  NotificationLevel::Info
}

pub struct ShowNotificationAction;

#[async_trait]
impl TypedAction for ShowNotificationAction {
  type Config = ShowNotificationConfig;

  async fn run(&self, config: ShowNotificationConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let output = json!({ "title": config.title, "message": config.message });
    ctx.page.notify(Notification {
      title: config.title,
      message: config.message,
      level: config.level,
    });
    Ok(ActionOutput::new(output))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("show-notification", "Show Notification", "bell", "Show a toast notification"),
    ConfigSchema::new()
      .property("title", PropertyDescriptor::text("Title"))
      .property("message", PropertyDescriptor::textarea("Message").required())
      .property(
        "level",
        PropertyDescriptor::select("Level", ["info", "success", "warning", "error"]).default_value("info"),
      ),
    json!({ "title": "Done", "message": "Saved" }),
    || Box::new(ShowNotificationAction),
  )
}

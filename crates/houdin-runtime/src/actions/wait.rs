use std::time::Duration;

use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::json;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Deserialize)]
pub struct WaitConfig {
  /// Milliseconds.
  pub duration: f64,
}

/// Sleeps, then passes through. Exempt from the node timeout.
pub struct WaitAction;

#[async_trait]
impl TypedAction for WaitAction {
  type Config = WaitConfig;

  async fn run(&self, config: WaitConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    if !config.duration.is_finite() || config.duration < 0.0 {
      return Err(ActionError::invalid_config("duration", "must be a non-negative number"));
    }
    let duration = Duration::from_millis(config.duration as u64);

    tokio::select! {
      _ = ctx.cancel.cancelled() => Err(ActionError::Cancelled),
      _ = tokio::time::sleep(duration) => {
        Ok(ActionOutput::new(json!({ "waited": duration.as_millis() as u64 })))
      }
    }
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("wait", "Wait", "clock", "Pause before continuing").without_timeout(),
    ConfigSchema::new().property(
      "duration",
      PropertyDescriptor::number("Duration (ms)").required().default_value(1000),
    ),
    json!({ "waited": 1000 }),
    || Box::new(WaitAction),
  )
}

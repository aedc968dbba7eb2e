use std::time::Duration;

use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::TriggerError;
use crate::trigger::{Trigger, TriggerContext, TriggerDescriptor, parse_config};

#[derive(Debug, Clone, Default, Deserialize)]
struct PageLoadConfig {
  /// Milliseconds after activation.
  #[serde(default)]
  delay: Option<f64>,
}

/// Fires once when the page becomes eligible for the workflow.
pub struct PageLoadTrigger;

impl Trigger for PageLoadTrigger {
  fn setup(&self, config: Map<String, Value>, ctx: &TriggerContext) -> Result<(), TriggerError> {
    let config: PageLoadConfig = parse_config(config)?;
    let delay = Duration::from_millis(config.delay.unwrap_or(0.0).max(0.0) as u64);
    let ctx = ctx.clone();

    tokio::spawn(async move {
      tokio::select! {
        _ = ctx.cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {
          let url = ctx.page.url();
          ctx.fire(json!({ "url": url }));
        }
      }
    });
    Ok(())
  }
}

pub fn descriptor() -> TriggerDescriptor {
  TriggerDescriptor::new(
    NodeMetadata::new("page-load", "Page Load", "file-check", "Run when a matching page loads"),
    ConfigSchema::new().property("delay", PropertyDescriptor::number("Delay (ms)")),
    json!({ "url": "https://example.com/" }),
    || Box::new(PageLoadTrigger),
  )
}

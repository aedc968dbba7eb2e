use std::time::Duration;

use async_trait::async_trait;
use houdin_bridge::{BridgeExt, NavigationRequest};
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::json;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Deserialize)]
pub struct NavigateConfig {
  pub url: String,
  /// Milliseconds to wait for the load to complete.
  #[serde(default)]
  pub timeout: Option<f64>,
}

/// Points the tab at a URL and waits for it to finish loading.
pub struct NavigateAction;

#[async_trait]
impl TypedAction for NavigateAction {
  type Config = NavigateConfig;

  async fn run(&self, config: NavigateConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let request = NavigationRequest {
      url: Some(config.url),
      tab_id: ctx.tab_id,
    };
    let wait = config
      .timeout
      .filter(|ms| *ms > 0.0)
      .map(|ms| Duration::from_millis(ms as u64));
    let result = ctx.bridge.wait_for_navigation(&request, wait, &ctx.cancel).await?;
    Ok(ActionOutput::new(json!({ "url": result.url })))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("navigate", "Navigate", "external-link", "Open a URL in the current tab")
      .with_timeout_property("timeout"),
    ConfigSchema::new()
      .property("url", PropertyDescriptor::text("URL").required())
      .property(
        "timeout",
        PropertyDescriptor::number("Timeout (ms)").describe("How long to wait for the page to load"),
      ),
    json!({ "url": "https://example.com/" }),
    || Box::new(NavigateAction),
  )
}

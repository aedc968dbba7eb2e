use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use houdin_runtime::{NetworkCapture, PageEvent};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::TriggerError;
use crate::network::capture_from_message;
use crate::pattern::UrlPattern;
use crate::trigger::{Trigger, TriggerContext, TriggerDescriptor, parse_config, spawn_listener};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestTriggerConfig {
  url_pattern: UrlPattern,
  #[serde(default = "default_method")]
  method: String,
}

fn default_method() -> String {
  "ANY".to_string()
}

impl HttpRequestTriggerConfig {
  fn matches(&self, capture: &NetworkCapture) -> bool {
    let method_ok = self.method.eq_ignore_ascii_case("ANY")
      || self.method.eq_ignore_ascii_case(&capture.request.method);
    method_ok && self.url_pattern.matches(&capture.request.url)
  }
}

/// Fires when the page completes a request matching a URL glob and method.
///
/// Captures arrive either as [`PageEvent::Network`] from a privileged
/// observer or as a fetch-shim message; both are handled the same.
pub struct HttpRequestTrigger;

impl Trigger for HttpRequestTrigger {
  fn setup(&self, config: Map<String, Value>, ctx: &TriggerContext) -> Result<(), TriggerError> {
    let config: HttpRequestTriggerConfig = parse_config(config)?;

    spawn_listener(ctx, move |event| {
      let capture = match event {
        PageEvent::Network(capture) => capture.clone(),
        PageEvent::Message { kind, data } => capture_from_message(kind, data)?,
        _ => return None,
      };
      if !config.matches(&capture) {
        return None;
      }
      serde_json::to_value(capture).ok()
    });
    Ok(())
  }
}

pub fn descriptor() -> TriggerDescriptor {
  TriggerDescriptor::new(
    NodeMetadata::new("http-request", "HTTP Request", "world-download", "Run when the page makes a matching request"),
    ConfigSchema::new()
      .property(
        "urlPattern",
        PropertyDescriptor::text("URL pattern")
          .required()
          .describe("Use * as a wildcard"),
      )
      .property(
        "method",
        PropertyDescriptor::select("Method", ["ANY", "GET", "POST", "PUT", "PATCH", "DELETE"])
          .default_value("ANY"),
      ),
    json!({
      "request": { "url": "https://api.example.com/orders", "method": "POST", "headers": {} },
      "response": { "status": 201, "statusText": "Created", "headers": {} }
    }),
    || Box::new(HttpRequestTrigger),
  )
}

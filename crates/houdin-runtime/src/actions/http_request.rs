use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use houdin_bridge::{BridgeExt, HttpRequest};
use houdin_config::Credential;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

const METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestConfig {
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  /// JSON object, or a string containing one.
  #[serde(default)]
  pub headers: Option<Value>,
  #[serde(default)]
  pub body: Option<String>,
  /// Milliseconds.
  #[serde(default)]
  pub timeout: Option<u64>,
  #[serde(default = "default_follow")]
  pub follow_redirects: bool,
  /// Stored credential id.
  #[serde(default)]
  pub credentials: Option<String>,
}

fn default_method() -> String {
  "GET".to_string()
}

fn default_follow() -> bool {
  true
}

/// Performs HTTP requests through the background context, free of page CORS.
pub struct HttpRequestAction;

#[async_trait]
impl TypedAction for HttpRequestAction {
  type Config = HttpRequestConfig;

  async fn run(&self, config: HttpRequestConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let mut headers = parse_headers(config.headers.as_ref())?;

    if let Some(id) = config.credentials.as_deref().filter(|id| !id.is_empty()) {
      let credential = ctx
        .credentials
        .credential(id)
        .ok_or_else(|| ActionError::invalid_config("credentials", format!("unknown credential: {}", id)))?;
      apply_credential(&credential, &mut headers)?;
    }

    let request = HttpRequest {
      url: config.url,
      method: config.method.to_uppercase(),
      headers,
      body: config.body.filter(|b| !b.is_empty()).map(parse_body),
      timeout: config.timeout,
      follow_redirects: config.follow_redirects,
    };

    let response = ctx.bridge.http(&request, &ctx.cancel).await?;
    if !response.is_success() {
      return Err(ActionError::Network(format!(
        "Request failed with status {} {}",
        response.status, response.status_text
      )));
    }

    let data = serde_json::to_value(&response).map_err(|e| ActionError::Failed(e.to_string()))?;
    Ok(ActionOutput::new(data))
  }
}

fn parse_headers(headers: Option<&Value>) -> Result<HashMap<String, String>, ActionError> {
  let object = match headers {
    None | Some(Value::Null) => return Ok(HashMap::new()),
    Some(Value::String(s)) if s.trim().is_empty() => return Ok(HashMap::new()),
    Some(Value::String(s)) => serde_json::from_str::<Value>(s)
      .map_err(|e| ActionError::invalid_config("headers", format!("invalid JSON: {}", e)))?,
    Some(other) => other.clone(),
  };

  match object {
    Value::Object(map) => Ok(
      map
        .into_iter()
        .map(|(k, v)| (k, super::text_of(&v)))
        .collect(),
    ),
    _ => Err(ActionError::invalid_config("headers", "expected a JSON object")),
  }
}

/// JSON bodies are sent as JSON, anything else as text.
fn parse_body(body: String) -> Value {
  match serde_json::from_str::<Value>(&body) {
    Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
    _ => Value::String(body),
  }
}

fn credential_field<'a>(credential: &'a Credential, field: &str) -> Result<&'a str, ActionError> {
  credential
    .config
    .get(field)
    .and_then(Value::as_str)
    .ok_or_else(|| {
      ActionError::invalid_config(
        "credentials",
        format!("credential '{}' has no {}", credential.name, field),
      )
    })
}

fn apply_credential(credential: &Credential, headers: &mut HashMap<String, String>) -> Result<(), ActionError> {
  match credential.credential_type.as_str() {
    "bearer-token" => {
      let token = credential_field(credential, "token")?;
      headers.insert("Authorization".to_string(), format!("Bearer {}", token));
    }
    "basic-auth" => {
      let username = credential_field(credential, "username")?;
      let password = credential_field(credential, "password")?;
      let encoded = STANDARD.encode(format!("{}:{}", username, password));
      headers.insert("Authorization".to_string(), format!("Basic {}", encoded));
    }
    "api-key" => {
      let key = credential_field(credential, "apiKey")?;
      let header = credential
        .config
        .get("headerName")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .unwrap_or("X-API-Key");
      headers.insert(header.to_string(), key.to_string());
    }
    other => {
      return Err(ActionError::invalid_config(
        "credentials",
        format!("unsupported credential type: {}", other),
      ));
    }
  }
  Ok(())
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new(
      "http-request",
      "HTTP Request",
      "world-www",
      "Send an HTTP request and return the response",
    )
    .with_timeout_property("timeout"),
    ConfigSchema::new()
      .property("url", PropertyDescriptor::text("URL").required())
      .property(
        "method",
        PropertyDescriptor::select("Method", METHODS).default_value("GET"),
      )
      .property(
        "headers",
        PropertyDescriptor::code("Headers").describe("JSON object of request headers"),
      )
      .property(
        "body",
        PropertyDescriptor::code("Body").show_when("method", json!(["POST", "PUT", "PATCH", "DELETE"])),
      )
      .property(
        "timeout",
        PropertyDescriptor::number("Timeout (ms)").default_value(30_000),
      )
      .property(
        "followRedirects",
        PropertyDescriptor::boolean("Follow redirects").default_value(true),
      )
      .property("credentials", PropertyDescriptor::credentials("Credentials")),
    json!({
      "status": 200,
      "statusText": "OK",
      "headers": { "content-type": "application/json" },
      "data": { "ip": "1.2.3.4" },
      "url": "https://api.ipify.org?format=json",
    }),
    || Box::new(HttpRequestAction),
  )
}

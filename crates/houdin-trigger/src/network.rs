//! Network captures from either observation strategy.
//!
//! A privileged background listener reports `webRequest`-style details; pages
//! without that privilege get a `fetch` shim that posts a message instead.
//! Both normalize into the same [`NetworkCapture`].

use std::collections::HashMap;

use houdin_runtime::{CapturedRequest, CapturedResponse, NetworkCapture};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message kind posted by the injected `fetch` shim.
pub const FETCH_SHIM_MESSAGE: &str = "houdin:network-capture";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderEntry {
  pub name: String,
  #[serde(default)]
  pub value: Option<String>,
}

/// Completed-request details from a privileged network observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRequestDetails {
  pub url: String,
  pub method: String,
  pub status_code: u16,
  /// e.g. `"HTTP/1.1 200 OK"`.
  #[serde(default)]
  pub status_line: Option<String>,
  #[serde(default)]
  pub request_headers: Vec<HeaderEntry>,
  #[serde(default)]
  pub response_headers: Vec<HeaderEntry>,
  #[serde(default)]
  pub request_body: Option<Value>,
}

impl WebRequestDetails {
  pub fn into_capture(self) -> NetworkCapture {
    let status_text = self
      .status_line
      .as_deref()
      .and_then(reason_phrase)
      .unwrap_or_default();

    NetworkCapture {
      request: CapturedRequest {
        url: self.url,
        method: self.method.to_uppercase(),
        headers: header_map(self.request_headers),
        body: self.request_body,
      },
      response: CapturedResponse {
        status: self.status_code,
        status_text,
        headers: header_map(self.response_headers),
        // The observer never sees response bodies.
        body: None,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShimRequest {
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  #[serde(default)]
  pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShimResponse {
  pub status: u16,
  #[serde(default)]
  pub status_text: String,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  #[serde(default)]
  pub body: Option<Value>,
}

/// Payload the `fetch` shim posts for each completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchShimMessage {
  pub request: ShimRequest,
  pub response: ShimResponse,
}

impl FetchShimMessage {
  pub fn into_capture(self) -> NetworkCapture {
    NetworkCapture {
      request: CapturedRequest {
        url: self.request.url,
        method: self.request.method.to_uppercase(),
        headers: lowercase_keys(self.request.headers),
        body: self.request.body,
      },
      response: CapturedResponse {
        status: self.response.status,
        status_text: self.response.status_text,
        headers: lowercase_keys(self.response.headers),
        body: self.response.body,
      },
    }
  }
}

/// Decode a shim message body; `None` when it is not one.
pub fn capture_from_message(kind: &str, data: &Value) -> Option<NetworkCapture> {
  if kind != FETCH_SHIM_MESSAGE {
    return None;
  }
  serde_json::from_value::<FetchShimMessage>(data.clone())
    .ok()
    .map(FetchShimMessage::into_capture)
}

fn default_method() -> String {
  "GET".to_string()
}

fn header_map(entries: Vec<HeaderEntry>) -> HashMap<String, String> {
  entries
    .into_iter()
    .map(|h| (h.name.to_lowercase(), h.value.unwrap_or_default()))
    .collect()
}

fn lowercase_keys(headers: HashMap<String, String>) -> HashMap<String, String> {
  headers.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()
}

fn reason_phrase(status_line: &str) -> Option<String> {
  let mut parts = status_line.splitn(3, ' ');
  parts.next()?;
  parts.next()?;
  parts.next().map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_both_strategies_produce_same_shape() {
    let observed: WebRequestDetails = serde_json::from_value(json!({
      "url": "https://api.example.com/orders",
      "method": "post",
      "statusCode": 201,
      "statusLine": "HTTP/1.1 201 Created",
      "requestHeaders": [{ "name": "Content-Type", "value": "application/json" }],
      "responseHeaders": [{ "name": "X-Id", "value": "7" }]
    }))
    .unwrap();

    let shimmed = capture_from_message(
      FETCH_SHIM_MESSAGE,
      &json!({
        "request": {
          "url": "https://api.example.com/orders",
          "method": "POST",
          "headers": { "content-type": "application/json" }
        },
        "response": { "status": 201, "statusText": "Created", "headers": { "x-id": "7" } }
      }),
    )
    .unwrap();

    assert_eq!(observed.into_capture(), shimmed);
  }

  #[test]
  fn test_other_messages_ignored() {
    assert!(capture_from_message("run-workflow", &json!({})).is_none());
    assert!(capture_from_message(FETCH_SHIM_MESSAGE, &json!({ "nope": 1 })).is_none());
  }

  #[test]
  fn test_reason_phrase_with_spaces() {
    assert_eq!(reason_phrase("HTTP/1.1 404 Not Found"), Some("Not Found".to_string()));
    assert_eq!(reason_phrase("HTTP/2 200"), None);
  }
}

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::dispatcher::{HandlerError, RequestHandler};
use crate::message::{ErrorCode, HttpRequest, HttpResponse};

/// Background-side `http-request` handler backed by reqwest.
///
/// Non-2xx statuses are returned as ordinary responses; only transport
/// failures become errors.
pub struct ReqwestHttpHandler {
  follow: Client,
  no_follow: Client,
  default_timeout: Duration,
}

impl ReqwestHttpHandler {
  pub fn new(default_timeout: Duration) -> Result<Self, reqwest::Error> {
    Ok(Self {
      follow: Client::builder().build()?,
      no_follow: Client::builder().redirect(Policy::none()).build()?,
      default_timeout,
    })
  }

  pub async fn perform(&self, input: HttpRequest) -> Result<HttpResponse, HandlerError> {
    let method = parse_method(&input.method)?;
    let client = if input.follow_redirects {
      &self.follow
    } else {
      &self.no_follow
    };

    let timeout = input
      .timeout
      .map(Duration::from_millis)
      .unwrap_or(self.default_timeout);

    let mut request = client.request(method, &input.url).timeout(timeout);
    for (key, value) in &input.headers {
      request = request.header(key, value);
    }

    match &input.body {
      None | Some(Value::Null) => {}
      Some(Value::String(text)) => request = request.body(text.clone()),
      Some(body) => request = request.json(body),
    }

    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    let url = response.url().to_string();
    let headers: HashMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.as_str().to_string(), val.to_string())))
      .collect();

    let body = response.text().await.map_err(transport_error)?;
    let data = serde_json::from_str(&body).unwrap_or(Value::String(body));

    debug!(status = status.as_u16(), url = %url, "http_response_received");

    Ok(HttpResponse {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      data,
      url,
    })
  }
}

#[async_trait]
impl RequestHandler for ReqwestHttpHandler {
  async fn handle(&self, data: Value) -> Result<Value, HandlerError> {
    let input: HttpRequest = serde_json::from_value(data).map_err(HandlerError::invalid_payload)?;
    let response = self.perform(input).await?;
    serde_json::to_value(response).map_err(HandlerError::invalid_payload)
  }
}

fn transport_error(err: reqwest::Error) -> HandlerError {
  let code = if err.is_timeout() {
    ErrorCode::Timeout
  } else {
    ErrorCode::Network
  };
  HandlerError::new(code, err.to_string())
}

fn parse_method(method: &str) -> Result<Method, HandlerError> {
  match method.to_uppercase().as_str() {
    "GET" => Ok(Method::GET),
    "POST" => Ok(Method::POST),
    "PUT" => Ok(Method::PUT),
    "DELETE" => Ok(Method::DELETE),
    "PATCH" => Ok(Method::PATCH),
    "HEAD" => Ok(Method::HEAD),
    "OPTIONS" => Ok(Method::OPTIONS),
    _ => Err(HandlerError::new(
      ErrorCode::InvalidPayload,
      format!("unsupported HTTP method: {}", method),
    )),
  }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::message::{BridgeRequest, BridgeResponse, ErrorCode, MessageKind, Reply};

/// Failure reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
  pub code: ErrorCode,
  pub message: String,
}

impl HandlerError {
  pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
    }
  }

  pub fn invalid_payload(err: impl std::fmt::Display) -> Self {
    Self::new(ErrorCode::InvalidPayload, err.to_string())
  }
}

/// Privileged-side implementation of one message kind.
#[async_trait]
pub trait RequestHandler: Send + Sync {
  async fn handle(&self, data: Value) -> Result<Value, HandlerError>;
}

/// Routes incoming requests to handlers by message type. Every request gets
/// exactly one reply, including unknown types.
#[derive(Default, Clone)]
pub struct BackgroundDispatcher {
  handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl BackgroundDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, kind: MessageKind, handler: Arc<dyn RequestHandler>) {
    self.register_raw(kind.as_str(), handler);
  }

  /// Register a handler for a message type outside [`MessageKind`].
  pub fn register_raw(&mut self, kind: impl Into<String>, handler: Arc<dyn RequestHandler>) {
    self.handlers.insert(kind.into(), handler);
  }

  pub fn handles(&self, kind: &str) -> bool {
    self.handlers.contains_key(kind)
  }

  #[instrument(name = "bridge_dispatch", skip(self, request), fields(request_id = %request.id, kind = %request.kind()))]
  pub async fn dispatch(&self, request: BridgeRequest) -> BridgeResponse {
    let reply = match self.handlers.get(request.kind()) {
      Some(handler) => match handler.handle(request.envelope.data).await {
        Ok(data) => {
          debug!("bridge_request_handled");
          Reply::Ok { data }
        }
        Err(err) => {
          debug!(code = ?err.code, message = %err.message, "bridge_request_failed");
          Reply::Error {
            code: err.code,
            message: err.message,
          }
        }
      },
      None => {
        warn!("bridge_unknown_kind");
        Reply::Error {
          code: ErrorCode::UnknownKind,
          message: format!("no handler for message type: {}", request.envelope.kind),
        }
      }
    };

    BridgeResponse {
      id: request.id,
      reply,
    }
  }
}

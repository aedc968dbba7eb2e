use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::message::{
  BridgeRequest, BridgeResponse, ErrorCode, HttpRequest, HttpResponse, MessageKind,
  NavigationRequest, NavigationResult, Reply, ScriptRequest,
};

/// Extra time the client waits beyond an operation's own timeout, so the
/// privileged side gets to report its own error first.
const GRACE: Duration = Duration::from_secs(1);

/// One-way delivery of requests to the privileged side.
///
/// Replies come back through [`PendingRequests::resolve`].
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: BridgeRequest) -> Result<(), BridgeError>;
}

/// Requests awaiting a reply, keyed by correlation id.
#[derive(Clone, Default)]
pub struct PendingRequests {
  inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<Reply>>>>,
}

impl PendingRequests {
  pub fn new() -> Self {
    Self::default()
  }

  fn register(&self, id: Uuid) -> oneshot::Receiver<Reply> {
    let (tx, rx) = oneshot::channel();
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(id, tx);
    rx
  }

  fn forget(&self, id: &Uuid) {
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(id);
  }

  /// Hand a reply to its waiting caller.
  ///
  /// Returns `false` when nobody is waiting any more (timed out, cancelled,
  /// or never sent from here); such replies are dropped.
  pub fn resolve(&self, response: BridgeResponse) -> bool {
    let sender = self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&response.id);

    match sender {
      Some(tx) => tx.send(response.reply).is_ok(),
      None => {
        debug!(request_id = %response.id, "late_response_dropped");
        false
      }
    }
  }

  pub fn len(&self) -> usize {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Caller-side view of the bridge.
#[async_trait]
pub trait Bridge: Send + Sync {
  /// Send one request and wait for its reply.
  ///
  /// `timeout` overrides the bridge's default window for this call.
  async fn request(
    &self,
    kind: MessageKind,
    data: Value,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
  ) -> Result<Value, BridgeError>;
}

/// Typed helpers for the built-in message kinds.
#[async_trait]
pub trait BridgeExt: Bridge {
  async fn http(
    &self,
    request: &HttpRequest,
    cancel: &CancellationToken,
  ) -> Result<HttpResponse, BridgeError> {
    let kind = MessageKind::HttpRequest;
    let data = encode(kind, request)?;
    let timeout = request.timeout.map(|ms| Duration::from_millis(ms) + GRACE);
    let value = self.request(kind, data, timeout, cancel).await?;
    decode(kind, value)
  }

  async fn execute_script(
    &self,
    request: &ScriptRequest,
    cancel: &CancellationToken,
  ) -> Result<Value, BridgeError> {
    let kind = MessageKind::ExecuteScript;
    let data = encode(kind, request)?;
    self.request(kind, data, None, cancel).await
  }

  async fn wait_for_navigation(
    &self,
    request: &NavigationRequest,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
  ) -> Result<NavigationResult, BridgeError> {
    let kind = MessageKind::WaitForNavigation;
    let data = encode(kind, request)?;
    let value = self.request(kind, data, timeout, cancel).await?;
    decode(kind, value)
  }
}

impl<T: Bridge + ?Sized> BridgeExt for T {}

fn encode<T: serde::Serialize>(kind: MessageKind, payload: &T) -> Result<Value, BridgeError> {
  serde_json::to_value(payload).map_err(|e| BridgeError::InvalidPayload {
    kind: kind.to_string(),
    message: e.to_string(),
  })
}

fn decode<T: serde::de::DeserializeOwned>(kind: MessageKind, value: Value) -> Result<T, BridgeError> {
  serde_json::from_value(value).map_err(|e| BridgeError::InvalidPayload {
    kind: kind.to_string(),
    message: e.to_string(),
  })
}

/// Correlating bridge client with a client-side timeout.
#[derive(Clone)]
pub struct BridgeClient {
  transport: Arc<dyn Transport>,
  pending: PendingRequests,
  timeout: Duration,
}

impl BridgeClient {
  pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
    Self::with_pending(transport, PendingRequests::new(), timeout)
  }

  /// Use an existing pending table, shared with whatever delivers replies.
  pub fn with_pending(transport: Arc<dyn Transport>, pending: PendingRequests, timeout: Duration) -> Self {
    Self {
      transport,
      pending,
      timeout,
    }
  }

  pub fn pending(&self) -> &PendingRequests {
    &self.pending
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  #[instrument(name = "bridge_request", skip(self, data, cancel), fields(kind = %kind))]
  async fn round_trip(
    &self,
    kind: MessageKind,
    data: Value,
    timeout: Duration,
    cancel: &CancellationToken,
  ) -> Result<Value, BridgeError> {
    let request = BridgeRequest::new(kind.as_str(), data);
    let id = request.id;
    let rx = self.pending.register(id);

    if let Err(err) = self.transport.send(request).await {
      self.pending.forget(&id);
      return Err(err);
    }

    let outcome = tokio::select! {
      _ = cancel.cancelled() => Err(BridgeError::Cancelled),
      received = tokio::time::timeout(timeout, rx) => match received {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(_)) => Err(BridgeError::Closed),
        Err(_) => Err(BridgeError::Timeout(format!(
          "{} request timed out after {}ms",
          kind,
          timeout.as_millis()
        ))),
      },
    };

    // Drop the slot so a late reply is recognised as stale.
    self.pending.forget(&id);

    match outcome {
      Ok(Reply::Ok { data }) => Ok(data),
      Ok(Reply::Error { code, message }) => Err(remote_error(kind, code, message)),
      Err(err) => {
        debug!(request_id = %id, error = %err, "bridge_request_abandoned");
        Err(err)
      }
    }
  }
}

#[async_trait]
impl Bridge for BridgeClient {
  async fn request(
    &self,
    kind: MessageKind,
    data: Value,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
  ) -> Result<Value, BridgeError> {
    self
      .round_trip(kind, data, timeout.unwrap_or(self.timeout), cancel)
      .await
  }
}

fn remote_error(kind: MessageKind, code: ErrorCode, message: String) -> BridgeError {
  match code {
    ErrorCode::Network => BridgeError::Network(message),
    ErrorCode::Timeout => BridgeError::Timeout(message),
    ErrorCode::Script => BridgeError::Script(message),
    ErrorCode::UnknownKind => BridgeError::UnknownKind(kind.to_string()),
    ErrorCode::InvalidPayload => BridgeError::InvalidPayload {
      kind: kind.to_string(),
      message,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tokio::sync::mpsc;

  /// Captures requests without ever replying.
  struct Capture(mpsc::UnboundedSender<BridgeRequest>);

  #[async_trait]
  impl Transport for Capture {
    async fn send(&self, request: BridgeRequest) -> Result<(), BridgeError> {
      self.0.send(request).map_err(|_| BridgeError::Closed)
    }
  }

  fn client(timeout_ms: u64) -> (BridgeClient, mpsc::UnboundedReceiver<BridgeRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = BridgeClient::new(Arc::new(Capture(tx)), Duration::from_millis(timeout_ms));
    (client, rx)
  }

  #[tokio::test]
  async fn test_reply_matched_by_id() {
    let (client, mut rx) = client(1_000);
    let pending = client.pending().clone();

    let responder = tokio::spawn(async move {
      let request = rx.recv().await.unwrap();
      assert_eq!(request.kind(), "execute-script");
      pending.resolve(BridgeResponse {
        id: request.id,
        reply: Reply::Ok { data: json!(42) },
      })
    });

    let result = client
      .request(MessageKind::ExecuteScript, json!({}), None, &CancellationToken::new())
      .await;
    assert_eq!(result, Ok(json!(42)));
    assert!(responder.await.unwrap());
    assert!(client.pending().is_empty());
  }

  #[tokio::test]
  async fn test_timeout_then_late_reply_is_dropped() {
    let (client, mut rx) = client(20);

    let result = client
      .request(MessageKind::HttpRequest, json!({}), None, &CancellationToken::new())
      .await;
    match result {
      Err(BridgeError::Timeout(message)) => assert!(message.contains("http-request")),
      other => panic!("expected timeout, got {:?}", other),
    }

    let request = rx.recv().await.unwrap();
    let delivered = client.pending().resolve(BridgeResponse {
      id: request.id,
      reply: Reply::Ok { data: json!("late") },
    });
    assert!(!delivered);
    assert!(client.pending().is_empty());
  }

  #[tokio::test]
  async fn test_cancel_abandons_request() {
    let (client, _rx) = client(10_000);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client
      .request(MessageKind::WaitForNavigation, json!({}), None, &cancel)
      .await;
    assert_eq!(result, Err(BridgeError::Cancelled));
    assert!(client.pending().is_empty());
  }

  #[tokio::test]
  async fn test_remote_error_codes_map_to_variants() {
    let (client, mut rx) = client(1_000);
    let pending = client.pending().clone();

    tokio::spawn(async move {
      let request = rx.recv().await.unwrap();
      pending.resolve(BridgeResponse {
        id: request.id,
        reply: Reply::Error {
          code: ErrorCode::Network,
          message: "connection refused".to_string(),
        },
      });
    });

    let result = client
      .http(&HttpRequest::get("http://localhost:1"), &CancellationToken::new())
      .await;
    assert_eq!(result, Err(BridgeError::Network("connection refused".to_string())));
  }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::{BridgeClient, PendingRequests, Transport};
use crate::dispatcher::BackgroundDispatcher;
use crate::error::BridgeError;
use crate::message::BridgeRequest;

/// Transport that hands requests to a dispatcher running on the same runtime.
///
/// Each request is handled on its own task, so a slow handler does not block
/// the others and replies may arrive out of order.
pub struct InProcessTransport {
  tx: mpsc::UnboundedSender<BridgeRequest>,
}

impl InProcessTransport {
  /// Spawn the background loop and return a client wired to it.
  ///
  /// Must be called from within a tokio runtime.
  pub fn connect(dispatcher: BackgroundDispatcher, timeout: Duration) -> BridgeClient {
    let (tx, mut rx) = mpsc::unbounded_channel::<BridgeRequest>();
    let pending = PendingRequests::new();
    let replies = pending.clone();
    let dispatcher = Arc::new(dispatcher);

    tokio::spawn(async move {
      while let Some(request) = rx.recv().await {
        let dispatcher = Arc::clone(&dispatcher);
        let replies = replies.clone();
        tokio::spawn(async move {
          let response = dispatcher.dispatch(request).await;
          replies.resolve(response);
        });
      }
      debug!("bridge_background_stopped");
    });

    BridgeClient::with_pending(Arc::new(InProcessTransport { tx }), pending, timeout)
  }
}

#[async_trait]
impl Transport for InProcessTransport {
  async fn send(&self, request: BridgeRequest) -> Result<(), BridgeError> {
    self.tx.send(request).map_err(|_| BridgeError::Closed)
  }
}

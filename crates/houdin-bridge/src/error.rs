use thiserror::Error;

/// Errors surfaced to the caller of a bridge request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
  /// Transport or HTTP failure. The message comes from the underlying client.
  #[error("{0}")]
  Network(String),

  /// No reply within the client-side window, or the remote operation timed out.
  #[error("{0}")]
  Timeout(String),

  /// The page-realm script failed.
  #[error("{0}")]
  Script(String),

  /// No handler is registered for this message type.
  #[error("no handler for message type: {0}")]
  UnknownKind(String),

  /// The handler rejected the payload.
  #[error("invalid {kind} payload: {message}")]
  InvalidPayload { kind: String, message: String },

  /// The caller's cancellation token fired first.
  #[error("request cancelled")]
  Cancelled,

  /// The transport is gone and can no longer deliver requests or replies.
  #[error("bridge closed")]
  Closed,
}

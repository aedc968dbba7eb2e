//! Execution events and notifiers for observability.
//!
//! Events are emitted during workflow execution so consumers can observe
//! progress, persist state, or stream it to a UI.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: String,
    workflow_id: String,
    trigger_node_id: String,
  },

  NodeStarted {
    execution_id: String,
    node_id: String,
  },

  /// A node succeeded and emitted on `handle`.
  NodeCompleted {
    execution_id: String,
    node_id: String,
    handle: String,
    data: serde_json::Value,
  },

  NodeFailed {
    execution_id: String,
    node_id: String,
    error: String,
  },

  NodeTimedOut {
    execution_id: String,
    node_id: String,
  },

  /// No more reachable nodes.
  WorkflowCompleted { execution_id: String },

  /// Cancelled while nodes were still running.
  WorkflowAborted { execution_id: String },
}

/// Receives execution events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

impl<T: ExecutionNotifier + ?Sized> ExecutionNotifier for Arc<T> {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls the engine; volume is a few
/// events per node.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

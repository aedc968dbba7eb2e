//! Houdin Runtime
//!
//! Executes a workflow graph in response to a trigger firing. The engine walks
//! connections whose source handle matches the handle each node emitted,
//! interpolates and validates each action's config, and runs the action under
//! a per-node timeout and a per-execution cancellation token.
//!
//! Actions reach the browser through two seams: a [`PageHost`] for the page
//! the workflow runs in, and a [`Bridge`](houdin_bridge::Bridge) to the
//! privileged background context.

pub mod actions;
mod action;
mod config;
mod context;
mod engine;
mod error;
mod events;
mod fake;
mod page;

pub use action::{
  Action, ActionContext, ActionDescriptor, ActionOutput, ActionRegistry, TypedAction,
};
pub use config::RuntimeConfig;
pub use context::{ExecutionContext, ExecutionMeta};
pub use engine::{
  ExecutionResult, ExecutionStatus, NodeResult, NodeStatus, Services, WorkflowEngine,
};
pub use error::{ActionError, ExecutionError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use fake::FakePage;
pub use page::{
  CapturedRequest, CapturedResponse, ComponentKind, Element, FormField, FormPrompt,
  InjectedComponent, KeyEvent, KeyPhase, Modal, NetworkCapture, Notification,
  NotificationLevel, PageError, PageEvent, PageHost,
};

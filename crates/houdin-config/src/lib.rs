//! Houdin Config
//!
//! This crate contains the serializable types shared by every Houdin crate.
//! They mirror the JSON the extension persists locally and exchanges with the
//! remote store, so field names follow the camelCase wire format.
//!
//! - [`WorkflowDefinition`] and its nodes and connections
//! - [`Credential`] records (local-only, never synced)
//! - Outbox entries, tombstones and the pull/push payloads of the sync API

mod connection;
mod credential;
mod node;
mod sync;
mod workflow;

pub use connection::{DEFAULT_INPUT_HANDLE, DEFAULT_OUTPUT_HANDLE, WorkflowConnection};
pub use credential::{Credential, CredentialLookup, credential_id};
pub use node::{NodeData, NodeKind, Position, WorkflowNode};
pub use sync::{
  OutboxAction, OutboxEntry, PullResponse, PushRequest, PushResponse, RemoteWorkflow,
  WorkflowTombstone,
};
pub use workflow::WorkflowDefinition;

/// Current wall-clock time as Unix milliseconds.
///
/// Every persisted timestamp (`modifiedAt`, outbox `timestamp`, credential
/// `createdAt`) uses this unit.
pub fn now_millis() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

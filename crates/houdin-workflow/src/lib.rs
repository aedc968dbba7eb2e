//! Houdin Workflow
//!
//! A [`Workflow`] is a [`WorkflowDefinition`](houdin_config::WorkflowDefinition)
//! whose graph has been checked and indexed for execution:
//! - every connection references existing nodes
//! - node ids are unique
//! - trigger nodes have no incoming connections
//! - the connection graph is acyclic
//!
//! The [`Graph`] keeps outgoing edges grouped by source handle so a runner can
//! follow only the branch a node actually emitted on.

mod error;
mod graph;
mod workflow;

pub use error::WorkflowError;
pub use graph::{Graph, Outgoing};
pub use workflow::Workflow;

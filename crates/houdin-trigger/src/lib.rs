//! Houdin Trigger
//!
//! Decides which workflow triggers are live on the current page and turns
//! trigger firings into executions. For every enabled workflow whose
//! `urlPattern` matches the page URL, each trigger node is set up once; it is
//! cleaned up when the page goes away, the workflow is disabled, or the URL
//! stops matching.

mod error;
mod manager;
mod network;
mod pattern;
mod trigger;
pub mod triggers;

pub use error::TriggerError;
pub use manager::{ActivationReport, TriggerManager};
pub use network::{
  FETCH_SHIM_MESSAGE, FetchShimMessage, HeaderEntry, ShimRequest, ShimResponse, WebRequestDetails,
  capture_from_message,
};
pub use pattern::{UrlPattern, matches_url_pattern};
pub use trigger::{
  Trigger, TriggerContext, TriggerDescriptor, TriggerFiring, TriggerRegistry, spawn_listener,
};

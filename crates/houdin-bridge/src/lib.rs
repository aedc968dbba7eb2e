//! Houdin Bridge
//!
//! Request/response messaging between the page context, where workflows run,
//! and the privileged background context, which can make cross-origin HTTP
//! requests, inject scripts into the page realm, and observe navigations.
//!
//! The caller side ([`BridgeClient`]) tags every request with a correlation id
//! and enforces the timeout itself. The privileged side
//! ([`BackgroundDispatcher`]) routes on the message `type` and replies once.
//! A reply that arrives after its caller gave up is dropped.

mod client;
mod dispatcher;
mod error;
mod http;
mod in_process;
mod message;

pub use client::{Bridge, BridgeClient, BridgeExt, PendingRequests, Transport};
pub use dispatcher::{BackgroundDispatcher, HandlerError, RequestHandler};
pub use error::BridgeError;
pub use http::ReqwestHttpHandler;
pub use in_process::InProcessTransport;
pub use message::{
  BridgeRequest, BridgeResponse, Envelope, ErrorCode, HttpRequest, HttpResponse, MessageKind,
  NavigationRequest, NavigationResult, Reply, ScriptRequest,
};

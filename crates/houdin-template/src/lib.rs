//! Houdin Template
//!
//! Resolves `{{ expression }}` placeholders in node configuration against the
//! current execution scope:
//!
//! - `{{ node_id }}` / `{{ node_id.path.to.field }}`: a prior node's output
//! - `{{ nodes["node-with-dashes"].field }}`: same, for ids that are not identifiers
//! - `{{ prev.field }}`: output of the node that scheduled the current one
//! - `{{ env.name }}`: workflow variables
//! - `{{ meta.url }}`: execution metadata
//!
//! Expressions are minijinja expressions. Liquid-style filter arguments
//! (`{{ "a" | append: "b" }}`) are accepted and rewritten before compiling.
//!
//! Rendering never fails: unresolvable references render as an empty string
//! and a placeholder that does not compile is left in the output verbatim.

mod context;
mod engine;
mod filters;
mod rewrite;

pub use context::TemplateContext;
pub use engine::{TemplateEngine, has_placeholders};

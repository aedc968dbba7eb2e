//! Houdin Registry
//!
//! Every trigger and action type is described by a [`Descriptor`]: display
//! metadata, a declarative [`ConfigSchema`], a sample output, and a factory that
//! builds a runtime instance. A [`Registry`] maps the string type id stored in
//! `node.data.type` to its descriptor.
//!
//! Registries are plain values constructed at startup and passed to whoever
//! needs them; there is no process-wide instance.
//!
//! The [`schema`] module validates and normalizes node configuration against a
//! descriptor's schema. It is also used on its own for credential forms.

mod error;
mod registry;
pub mod schema;

pub use error::{RegistryError, ValidationErrors};
pub use registry::{Descriptor, NodeMetadata, Registry, StaticDescriptor, ValidationReport};
pub use schema::{ConfigSchema, PropertyDescriptor, PropertyType, SelectOption, ShowWhen};

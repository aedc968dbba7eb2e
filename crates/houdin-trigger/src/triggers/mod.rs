//! Built-in trigger types.

mod button_click;
mod http_request;
mod keybinding;
mod page_load;
mod popup;

pub use button_click::ButtonClickTrigger;
pub use http_request::HttpRequestTrigger;
pub use keybinding::{KeybindingTrigger, normalize_combo};
pub use page_load::PageLoadTrigger;
pub use popup::{PopupTrigger, RUN_WORKFLOW_MESSAGE};

use crate::trigger::{TriggerDescriptor, TriggerRegistry};

pub fn descriptors() -> Vec<TriggerDescriptor> {
  vec![
    button_click::descriptor(),
    keybinding::descriptor(),
    page_load::descriptor(),
    http_request::descriptor(),
    popup::descriptor(),
  ]
}

/// A registry populated with every built-in trigger.
pub fn builtin_triggers() -> TriggerRegistry {
  let mut registry = TriggerRegistry::new();
  for descriptor in descriptors() {
    registry.register(descriptor);
  }
  registry
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_registry_is_complete() {
    assert_eq!(
      builtin_triggers().types(),
      vec!["button-click", "http-request", "keybinding", "page-load", "popup"]
    );
  }
}

//! Built-in action types.
//!
//! Each module exposes its action and a `descriptor()`; [`builtin_actions`]
//! registers all of them into a fresh registry.

mod condition;
mod dom;
mod form;
mod http_request;
mod modal;
mod navigate;
mod notification;
mod script;
mod storage;
mod variable;
mod wait;

pub use condition::{ConditionAction, ConditionConfig, Operator};
pub use dom::{ClickElementAction, GetElementContentAction, SetInputValueAction};
pub use form::InputFormAction;
pub use http_request::{HttpRequestAction, HttpRequestConfig};
pub use modal::ShowModalAction;
pub use navigate::NavigateAction;
pub use notification::ShowNotificationAction;
pub use script::UserScriptAction;
pub use storage::LocalStorageAction;
pub use variable::CreateVariableAction;
pub use wait::WaitAction;

use crate::action::{ActionDescriptor, ActionRegistry};

/// Descriptors for every built-in action.
pub fn descriptors() -> Vec<ActionDescriptor> {
  vec![
    http_request::descriptor(),
    condition::descriptor(),
    modal::descriptor(),
    notification::descriptor(),
    variable::descriptor(),
    wait::descriptor(),
    dom::click_descriptor(),
    dom::content_descriptor(),
    dom::set_value_descriptor(),
    script::descriptor(),
    navigate::descriptor(),
    form::descriptor(),
    storage::descriptor(),
  ]
}

/// A registry populated with every built-in action.
pub fn builtin_actions() -> ActionRegistry {
  let mut registry = ActionRegistry::new();
  for descriptor in descriptors() {
    registry.register(descriptor);
  }
  registry
}

/// Render a JSON scalar the way it reads in a form field.
pub(crate) fn text_of(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::Null => String::new(),
    serde_json::Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_registry_is_complete() {
    let registry = builtin_actions();
    assert_eq!(
      registry.types(),
      vec![
        "click-element",
        "create-variable",
        "get-element-content",
        "http-request",
        "if",
        "input-form",
        "local-storage",
        "navigate",
        "set-input-value",
        "show-modal",
        "show-notification",
        "user-script",
        "wait",
      ]
    );
  }

  #[test]
  fn test_interactive_actions_disable_timeout() {
    let registry = builtin_actions();
    for type_id in ["input-form", "wait"] {
      assert!(registry.get(type_id).unwrap().metadata.disable_timeout, "{}", type_id);
    }
    assert!(!registry.get("http-request").unwrap().metadata.disable_timeout);
  }

  #[test]
  fn test_branching_outputs_declared() {
    let registry = builtin_actions();
    assert_eq!(registry.get("if").unwrap().metadata.outputs, vec!["true", "false"]);
  }
}

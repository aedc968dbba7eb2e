use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use houdin_runtime::{KeyEvent, KeyPhase, PageEvent};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::TriggerError;
use crate::trigger::{Trigger, TriggerContext, TriggerDescriptor, parse_config, spawn_listener};

const MODIFIERS: [&str; 4] = ["ctrl", "alt", "shift", "meta"];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeybindingConfig {
  keys: String,
  #[serde(default = "default_phase")]
  event_type: KeyPhase,
}

fn default_phase() -> KeyPhase {
  KeyPhase::Down
}

fn canonical_key(key: &str) -> String {
  let key = key.trim().to_lowercase();
  match key.as_str() {
    "control" | "ctl" => "ctrl".to_string(),
    "option" | "opt" => "alt".to_string(),
    "cmd" | "command" | "super" | "win" | "os" => "meta".to_string(),
    "esc" => "escape".to_string(),
    "" | "spacebar" => "space".to_string(),
    "return" => "enter".to_string(),
    "del" => "delete".to_string(),
    "up" => "arrowup".to_string(),
    "down" => "arrowdown".to_string(),
    "left" => "arrowleft".to_string(),
    "right" => "arrowright".to_string(),
    _ => key,
  }
}

fn join_combo(modifiers: [bool; 4], key: &str) -> String {
  let mut parts: Vec<&str> = MODIFIERS
    .iter()
    .zip(modifiers)
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect();
  parts.push(key);
  parts.join("+")
}

/// Canonical form of a combo like `"Cmd+Shift+K"`: lowercase, modifiers in
/// `ctrl+alt+shift+meta` order, key last. `None` when there is no key.
pub fn normalize_combo(combo: &str) -> Option<String> {
  let trimmed = combo.trim();
  // "Ctrl++" binds the plus key.
  let (body, plus_key) = match trimmed.strip_suffix("++") {
    Some(rest) => (rest, true),
    None if trimmed == "+" => ("", true),
    None => (trimmed, false),
  };

  let mut modifiers = [false; 4];
  let mut key = plus_key.then(|| "+".to_string());
  for part in body.split('+').filter(|p| !p.trim().is_empty()) {
    let part = canonical_key(part);
    match MODIFIERS.iter().position(|m| *m == part) {
      Some(i) => modifiers[i] = true,
      None => key = Some(part),
    }
  }

  key.map(|key| join_combo(modifiers, &key))
}

/// Canonical combo for a key event; `None` for a bare modifier press.
fn event_combo(event: &KeyEvent) -> Option<String> {
  let key = canonical_key(&event.key);
  if MODIFIERS.contains(&key.as_str()) {
    return None;
  }
  Some(join_combo([event.ctrl, event.alt, event.shift, event.meta], &key))
}

/// Fires on a global key combination.
pub struct KeybindingTrigger;

impl Trigger for KeybindingTrigger {
  fn setup(&self, config: Map<String, Value>, ctx: &TriggerContext) -> Result<(), TriggerError> {
    let config: KeybindingConfig = parse_config(config)?;
    let combo = normalize_combo(&config.keys)
      .ok_or_else(|| TriggerError::invalid_config("keys", "no key in combination"))?;
    let phase = config.event_type;

    spawn_listener(ctx, move |event| match event {
      PageEvent::Key(key) if key.phase == phase && event_combo(key).as_deref() == Some(combo.as_str()) => {
        Some(json!({ "keys": combo, "key": key.key }))
      }
      _ => None,
    });
    Ok(())
  }
}

pub fn descriptor() -> TriggerDescriptor {
  TriggerDescriptor::new(
    NodeMetadata::new("keybinding", "Keybinding", "keyboard", "Run on a keyboard shortcut"),
    ConfigSchema::new()
      .property(
        "keys",
        PropertyDescriptor::text("Keys").required().describe("e.g. Ctrl+Shift+K"),
      )
      .property(
        "eventType",
        PropertyDescriptor::select("Event", ["down", "up"]).default_value("down"),
      ),
    json!({ "keys": "ctrl+shift+k", "key": "K" }),
    || Box::new(KeybindingTrigger),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_orders_modifiers() {
    assert_eq!(normalize_combo("Shift+Ctrl+K").as_deref(), Some("ctrl+shift+k"));
    assert_eq!(normalize_combo(" cmd + Option + p ").as_deref(), Some("alt+meta+p"));
    assert_eq!(normalize_combo("Esc").as_deref(), Some("escape"));
    assert_eq!(normalize_combo("Ctrl+Shift"), None);
  }

  #[test]
  fn test_plus_key() {
    assert_eq!(normalize_combo("Ctrl++").as_deref(), Some("ctrl++"));
  }

  #[test]
  fn test_event_matches_config() {
    let mut event = KeyEvent::down("K");
    event.ctrl = true;
    event.shift = true;
    assert_eq!(event_combo(&event), normalize_combo("ctrl+shift+k"));

    event.key = "Shift".to_string();
    assert_eq!(event_combo(&event), None);
  }
}

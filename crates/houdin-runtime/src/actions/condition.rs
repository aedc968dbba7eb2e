use async_trait::async_trait;
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};

use super::text_of;
use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Operator {
  #[serde(rename = "==")]
  Equal,
  #[serde(rename = "!=")]
  NotEqual,
  #[serde(rename = ">")]
  Greater,
  #[serde(rename = ">=")]
  GreaterOrEqual,
  #[serde(rename = "<")]
  Less,
  #[serde(rename = "<=")]
  LessOrEqual,
  #[serde(rename = "contains")]
  Contains,
  #[serde(rename = "not_contains")]
  NotContains,
  #[serde(rename = "starts_with")]
  StartsWith,
  #[serde(rename = "ends_with")]
  EndsWith,
  #[serde(rename = "is_empty")]
  IsEmpty,
  #[serde(rename = "is_not_empty")]
  IsNotEmpty,
}

const OPERATORS: [&str; 12] = [
  "==",
  "!=",
  ">",
  ">=",
  "<",
  "<=",
  "contains",
  "not_contains",
  "starts_with",
  "ends_with",
  "is_empty",
  "is_not_empty",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionConfig {
  #[serde(default)]
  pub a: Value,
  pub operator: Operator,
  #[serde(default)]
  pub b: Value,
}

impl ConditionConfig {
  /// Numbers compare numerically when both sides parse; otherwise as text.
  pub fn evaluate(&self) -> bool {
    let (a, b) = (text_of(&self.a), text_of(&self.b));
    let numbers = a.trim().parse::<f64>().ok().zip(b.trim().parse::<f64>().ok());

    match self.operator {
      Operator::Equal => match numbers {
        Some((x, y)) => x == y,
        None => a == b,
      },
      Operator::NotEqual => match numbers {
        Some((x, y)) => x != y,
        None => a != b,
      },
      Operator::Greater => match numbers {
        Some((x, y)) => x > y,
        None => a > b,
      },
      Operator::GreaterOrEqual => match numbers {
        Some((x, y)) => x >= y,
        None => a >= b,
      },
      Operator::Less => match numbers {
        Some((x, y)) => x < y,
        None => a < b,
      },
      Operator::LessOrEqual => match numbers {
        Some((x, y)) => x <= y,
        None => a <= b,
      },
      Operator::Contains => a.contains(&b),
      Operator::NotContains => !a.contains(&b),
      Operator::StartsWith => a.starts_with(&b),
      Operator::EndsWith => a.ends_with(&b),
      Operator::IsEmpty => a.trim().is_empty(),
      Operator::IsNotEmpty => !a.trim().is_empty(),
    }
  }
}

/// Branches on a comparison, emitting on the `true` or `false` handle.
pub struct ConditionAction;

#[async_trait]
impl TypedAction for ConditionAction {
  type Config = ConditionConfig;

  async fn run(&self, config: ConditionConfig, _ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let result = config.evaluate();
    let handle = if result { "true" } else { "false" };
    Ok(ActionOutput::on(
      handle,
      json!({ "result": result, "a": config.a, "b": config.b }),
    ))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("if", "If", "git-branch", "Continue on the true or false branch")
      .with_outputs(["true", "false"]),
    ConfigSchema::new()
      .property("a", PropertyDescriptor::text("Value A"))
      .property(
        "operator",
        PropertyDescriptor::select("Operator", OPERATORS)
          .required()
          .default_value("=="),
      )
      .property(
        "b",
        PropertyDescriptor::text("Value B").show_when(
          "operator",
          json!(OPERATORS[..10]),
        ),
      ),
    json!({ "result": true, "a": "5", "b": "3" }),
    || Box::new(ConditionAction),
  )
}

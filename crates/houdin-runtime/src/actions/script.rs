use async_trait::async_trait;
use houdin_bridge::{BridgeExt, ScriptRequest};
use houdin_registry::{ConfigSchema, NodeMetadata, PropertyDescriptor};
use serde::Deserialize;
use serde_json::json;

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, TypedAction};
use crate::error::ActionError;

#[derive(Debug, Clone, Deserialize)]
pub struct UserScriptConfig {
  pub code: String,
}

/// Runs user code in the page's main world via the background context.
///
/// Pages with a strict Content Security Policy refuse the injection; that
/// surfaces as [`ActionError::CspViolation`].
pub struct UserScriptAction;

#[async_trait]
impl TypedAction for UserScriptAction {
  type Config = UserScriptConfig;

  async fn run(&self, config: UserScriptConfig, ctx: &ActionContext) -> Result<ActionOutput, ActionError> {
    let request = ScriptRequest {
      code: config.code,
      tab_id: ctx.tab_id,
    };
    let result = ctx.bridge.execute_script(&request, &ctx.cancel).await?;
    Ok(ActionOutput::new(json!({ "result": result })))
  }
}

pub fn descriptor() -> ActionDescriptor {
  ActionDescriptor::new(
    NodeMetadata::new("user-script", "User Script", "code", "Run JavaScript in the page"),
    ConfigSchema::new().property(
      "code",
      PropertyDescriptor::code("Code")
        .required()
        .describe("The value of the last expression is the node output"),
    ),
    json!({ "result": 42 }),
    || Box::new(UserScriptAction),
  )
}

//! Workflow execution engine.
//!
//! One call to [`WorkflowEngine::execute`] is one firing of one trigger. The
//! engine owns the [`ExecutionContext`] for that firing and walks the graph
//! from the trigger:
//!
//! - only connections on the handle a node emitted are followed
//! - a node runs at most once per firing; the first predecessor to resolve
//!   schedules it and later ones are ignored
//! - a failed, timed-out, or invalid node halts its own branch only
//! - independent branches run concurrently in no particular order

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use houdin_bridge::Bridge;
use houdin_config::{Credential, CredentialLookup, DEFAULT_OUTPUT_HANDLE, WorkflowNode, now_millis};
use houdin_registry::schema;
use houdin_template::{TemplateContext, TemplateEngine};
use houdin_workflow::{Graph, Workflow};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::action::{ActionContext, ActionDescriptor, ActionOutput, ActionRegistry};
use crate::config::RuntimeConfig;
use crate::context::{ExecutionContext, ExecutionMeta};
use crate::error::{ActionError, ExecutionError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::page::{Notification, NotificationLevel, PageHost};

/// Terminal state of one node within an execution.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatus {
  Succeeded { handle: String },
  Failed { error: ActionError },
  TimedOut,
  /// Still running when the execution was aborted.
  Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeResult {
  pub node_id: String,
  pub status: NodeStatus,
  /// Output, for succeeded nodes.
  pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
  /// Every reachable node has settled.
  Completed,
  /// The cancellation token fired first.
  Aborted,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  /// One entry per node that was scheduled. The trigger is not included.
  pub node_results: HashMap<String, NodeResult>,
  pub context: ExecutionContext,
}

impl ExecutionResult {
  pub fn status_of(&self, node_id: &str) -> Option<&NodeStatus> {
    self.node_results.get(node_id).map(|r| &r.status)
  }

  pub fn executed(&self, node_id: &str) -> bool {
    self.node_results.contains_key(node_id)
  }
}

struct NoCredentials;

impl CredentialLookup for NoCredentials {
  fn credential(&self, _id: &str) -> Option<Credential> {
    None
  }
}

/// Collaborators handed to every action.
#[derive(Clone)]
pub struct Services {
  pub page: Arc<dyn PageHost>,
  pub bridge: Arc<dyn Bridge>,
  pub credentials: Arc<dyn CredentialLookup>,
}

impl Services {
  pub fn new(
    page: Arc<dyn PageHost>,
    bridge: Arc<dyn Bridge>,
    credentials: Arc<dyn CredentialLookup>,
  ) -> Self {
    Self {
      page,
      bridge,
      credentials,
    }
  }

  pub fn without_credentials(page: Arc<dyn PageHost>, bridge: Arc<dyn Bridge>) -> Self {
    Self::new(page, bridge, Arc::new(NoCredentials))
  }
}

enum NodeFailure {
  Failed(ActionError),
  TimedOut(Duration),
}

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` so callers choose how events are
/// observed. Use [`WorkflowEngine::new`] for no-op notifications.
pub struct WorkflowEngine<N: ExecutionNotifier = NoopNotifier> {
  actions: Arc<ActionRegistry>,
  templates: TemplateEngine,
  services: Services,
  config: RuntimeConfig,
  notifier: N,
}

impl WorkflowEngine<NoopNotifier> {
  pub fn new(actions: Arc<ActionRegistry>, services: Services, config: RuntimeConfig) -> Self {
    Self::with_notifier(actions, services, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> WorkflowEngine<N> {
  pub fn with_notifier(
    actions: Arc<ActionRegistry>,
    services: Services,
    config: RuntimeConfig,
    notifier: N,
  ) -> Self {
    Self {
      actions,
      templates: TemplateEngine::new(),
      services,
      config,
      notifier,
    }
  }

  pub fn actions(&self) -> &ActionRegistry {
    &self.actions
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  pub fn services(&self) -> &Services {
    &self.services
  }

  /// Run one firing of `trigger_node_id`, seeded with `trigger_output`.
  ///
  /// Node failures do not fail the call; they are reported per node in the
  /// result. An error means the execution could not start.
  #[instrument(
    name = "workflow_execution",
    skip_all,
    fields(workflow_id = %workflow.id(), trigger_node_id = %trigger_node_id)
  )]
  pub async fn execute(
    &self,
    workflow: &Workflow,
    trigger_node_id: &str,
    trigger_output: Value,
    cancel: CancellationToken,
  ) -> Result<ExecutionResult, ExecutionError> {
    let trigger = workflow.node(trigger_node_id)?;
    if !trigger.is_trigger() {
      return Err(ExecutionError::NotATrigger(trigger_node_id.to_string()));
    }
    if !workflow.definition().enabled {
      return Err(ExecutionError::WorkflowDisabled(workflow.id().to_string()));
    }

    let execution_id = uuid::Uuid::new_v4().to_string();
    let meta = ExecutionMeta {
      url: self.services.page.url(),
      tab_id: self.services.page.tab_id(),
      timestamp: now_millis(),
      workflow_id: workflow.id().to_string(),
      execution_id: execution_id.clone(),
      trigger_node_id: trigger_node_id.to_string(),
    };
    let mut ctx = ExecutionContext::new(workflow.definition().variables.clone(), meta);

    info!(execution_id = %execution_id, "workflow_started");
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      workflow_id: workflow.id().to_string(),
      trigger_node_id: trigger_node_id.to_string(),
    });

    ctx.set_output(trigger_node_id, trigger_output.clone());

    let mut scheduled = HashSet::from([trigger_node_id.to_string()]);
    let mut running: HashSet<String> = HashSet::new();
    let mut results: HashMap<String, NodeResult> = HashMap::new();
    let mut in_flight = FuturesUnordered::new();

    let mut ready: Vec<(String, Value)> = claim_successors(
      workflow.graph(),
      trigger_node_id,
      DEFAULT_OUTPUT_HANDLE,
      &mut scheduled,
    )
    .into_iter()
    .map(|id| (id, trigger_output.clone()))
    .collect();

    let status = loop {
      for (node_id, prev) in ready.drain(..) {
        let node = workflow.node(&node_id)?.clone();
        let scope = ctx.template_context(Some(&prev));

        debug!(execution_id = %execution_id, node_id = %node_id, "node_started");
        self.notifier.notify(ExecutionEvent::NodeStarted {
          execution_id: execution_id.clone(),
          node_id: node_id.clone(),
        });

        running.insert(node_id);
        in_flight.push(self.run_node(
          node,
          scope,
          workflow.id().to_string(),
          execution_id.clone(),
          cancel.clone(),
        ));
      }

      let next = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        next = in_flight.next() => Some(next),
      };

      let (node_id, type_id, outcome) = match next {
        None => break ExecutionStatus::Aborted,
        Some(None) => break ExecutionStatus::Completed,
        Some(Some(settled)) => settled,
      };
      running.remove(&node_id);

      match outcome {
        Ok(output) => {
          info!(execution_id = %execution_id, node_id = %node_id, handle = %output.handle, "node_completed");
          self.notifier.notify(ExecutionEvent::NodeCompleted {
            execution_id: execution_id.clone(),
            node_id: node_id.clone(),
            handle: output.handle.clone(),
            data: output.data.clone(),
          });

          ctx.set_output(&node_id, output.data.clone());
          ready.extend(
            claim_successors(workflow.graph(), &node_id, &output.handle, &mut scheduled)
              .into_iter()
              .map(|id| (id, output.data.clone())),
          );

          results.insert(
            node_id.clone(),
            NodeResult {
              node_id,
              status: NodeStatus::Succeeded {
                handle: output.handle,
              },
              data: Some(output.data),
            },
          );
        }
        Err(NodeFailure::TimedOut(after)) => {
          warn!(execution_id = %execution_id, node_id = %node_id, after_ms = after.as_millis() as u64, "node_timed_out");
          self.notifier.notify(ExecutionEvent::NodeTimedOut {
            execution_id: execution_id.clone(),
            node_id: node_id.clone(),
          });
          self.report_failure(&type_id, &format!("timed out after {}s", after.as_secs()));

          results.insert(
            node_id.clone(),
            NodeResult {
              node_id,
              status: NodeStatus::TimedOut,
              data: None,
            },
          );
        }
        Err(NodeFailure::Failed(error)) => {
          warn!(execution_id = %execution_id, node_id = %node_id, error = %error, "node_failed");
          self.notifier.notify(ExecutionEvent::NodeFailed {
            execution_id: execution_id.clone(),
            node_id: node_id.clone(),
            error: error.to_string(),
          });
          self.report_failure(&type_id, &error.to_string());

          results.insert(
            node_id.clone(),
            NodeResult {
              node_id,
              status: NodeStatus::Failed { error },
              data: None,
            },
          );
        }
      }
    };

    // Abandon whatever is still running; their node tokens are children of `cancel`.
    drop(in_flight);
    for node_id in running {
      results.insert(
        node_id.clone(),
        NodeResult {
          node_id,
          status: NodeStatus::Cancelled,
          data: None,
        },
      );
    }

    match status {
      ExecutionStatus::Completed => {
        info!(execution_id = %execution_id, nodes = results.len(), "workflow_completed");
        self.notifier.notify(ExecutionEvent::WorkflowCompleted {
          execution_id: execution_id.clone(),
        });
      }
      ExecutionStatus::Aborted => {
        info!(execution_id = %execution_id, "workflow_aborted");
        self.notifier.notify(ExecutionEvent::WorkflowAborted {
          execution_id: execution_id.clone(),
        });
      }
    }

    Ok(ExecutionResult {
      execution_id,
      workflow_id: workflow.id().to_string(),
      status,
      node_results: results,
      context: ctx,
    })
  }

  /// Execute a single action node outside of any graph.
  ///
  /// `input` is visible to templates as `prev` and as the `trigger` node.
  pub async fn execute_node(
    &self,
    node: &WorkflowNode,
    input: Value,
    cancel: CancellationToken,
  ) -> Result<ActionOutput, ActionError> {
    let scope = TemplateContext::new()
      .with_node("trigger", input.clone())
      .with_prev(input)
      .with_meta("url", self.services.page.url());
    let execution_id = uuid::Uuid::new_v4().to_string();

    match self
      .invoke(node, &scope, "adhoc", &execution_id, &cancel)
      .await
    {
      Ok(output) => Ok(output),
      Err(NodeFailure::Failed(error)) => Err(error),
      Err(NodeFailure::TimedOut(after)) => Err(ActionError::Timeout(format!(
        "node '{}' timed out after {}ms",
        node.id,
        after.as_millis()
      ))),
    }
  }

  async fn run_node(
    &self,
    node: WorkflowNode,
    scope: TemplateContext,
    workflow_id: String,
    execution_id: String,
    cancel: CancellationToken,
  ) -> (String, String, Result<ActionOutput, NodeFailure>) {
    let outcome = self
      .invoke(&node, &scope, &workflow_id, &execution_id, &cancel)
      .await;
    (node.id, node.data.type_id, outcome)
  }

  async fn invoke(
    &self,
    node: &WorkflowNode,
    scope: &TemplateContext,
    workflow_id: &str,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<ActionOutput, NodeFailure> {
    let descriptor = self
      .actions
      .get(&node.data.type_id)
      .map_err(|e| NodeFailure::Failed(e.into()))?;

    let config = self
      .prepare_config(descriptor, node, scope)
      .map_err(NodeFailure::Failed)?;

    let limit = self.node_deadline(descriptor, &config);
    let action = descriptor.instantiate();
    let node_cancel = cancel.child_token();
    let action_ctx = ActionContext {
      workflow_id: workflow_id.to_string(),
      execution_id: execution_id.to_string(),
      node_id: node.id.clone(),
      tab_id: self.services.page.tab_id(),
      page: Arc::clone(&self.services.page),
      bridge: Arc::clone(&self.services.bridge),
      credentials: Arc::clone(&self.services.credentials),
      modal_timeout: self.config.modal_timeout,
      cancel: node_cancel.clone(),
    };

    let run = async {
      tokio::select! {
        result = action.execute(config, &action_ctx) => result,
        _ = node_cancel.cancelled() => Err(ActionError::Cancelled),
      }
    };

    if descriptor.metadata.disable_timeout {
      return run.await.map_err(NodeFailure::Failed);
    }

    match tokio::time::timeout(limit, run).await {
      Ok(result) => result.map_err(NodeFailure::Failed),
      Err(_) => {
        node_cancel.cancel();
        Err(NodeFailure::TimedOut(limit))
      }
    }
  }

  /// The action's own timeout plus grace when it declares one, else the default.
  fn node_deadline(&self, descriptor: &ActionDescriptor, config: &Map<String, Value>) -> Duration {
    descriptor
      .metadata
      .timeout_property
      .as_deref()
      .and_then(|property| config.get(property))
      .and_then(Value::as_f64)
      .filter(|ms| ms.is_finite() && *ms > 0.0)
      .map(|ms| Duration::from_millis(ms as u64) + self.config.timeout_grace)
      .unwrap_or(self.config.default_node_timeout)
  }

  /// Interpolate, default, and validate a node's raw config.
  fn prepare_config(
    &self,
    descriptor: &ActionDescriptor,
    node: &WorkflowNode,
    scope: &TemplateContext,
  ) -> Result<Map<String, Value>, ActionError> {
    let raw = Value::Object(node.data.config.clone());
    let interpolated = match self.templates.interpolate_value(&raw, scope) {
      Value::Object(map) => map,
      _ => Map::new(),
    };

    let normalized = schema::normalize(&descriptor.config_schema, &interpolated);
    schema::validate(&descriptor.config_schema, &normalized)?;
    Ok(normalized)
  }

  fn report_failure(&self, type_id: &str, message: &str) {
    let title = self
      .actions
      .get(type_id)
      .map(|d| d.metadata.label.clone())
      .unwrap_or_else(|_| type_id.to_string());

    self.services.page.notify(Notification {
      title: format!("{} failed", title),
      message: message.to_string(),
      level: NotificationLevel::Error,
    });
  }
}

/// Successors on `handle` that have not been scheduled yet in this firing.
fn claim_successors(
  graph: &Graph,
  node_id: &str,
  handle: &str,
  scheduled: &mut HashSet<String>,
) -> Vec<String> {
  let mut claimed = Vec::new();
  for target in graph.successors(node_id, handle) {
    if scheduled.insert(target.to_string()) {
      if graph.is_join_point(target) {
        debug!(node_id = %target, claimed_by = %node_id, "join_claimed");
      }
      claimed.push(target.to_string());
    } else {
      debug!(node_id = %target, "node_already_scheduled");
    }
  }
  claimed
}

//! Trigger lifecycle.
//!
//! The manager holds the current workflow list and keeps the set of live
//! triggers in step with it and with the page URL. A workflow is active while
//! it is enabled and its `urlPattern` matches; each of its trigger nodes is set
//! up once on activation and cleaned up on deactivation. Deactivating a
//! workflow also aborts its in-flight executions.

use std::collections::HashMap;
use std::sync::Arc;

use houdin_config::WorkflowDefinition;
use houdin_registry::schema;
use houdin_runtime::{
  ExecutionError, ExecutionNotifier, ExecutionResult, NoopNotifier, PageEvent, PageHost,
  WorkflowEngine,
};
use houdin_workflow::Workflow;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::TriggerError;
use crate::pattern::UrlPattern;
use crate::trigger::{Trigger, TriggerContext, TriggerFiring, TriggerRegistry};

/// What a call to [`TriggerManager::set_workflows`] or
/// [`TriggerManager::refresh`] changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationReport {
  pub activated: Vec<String>,
  pub deactivated: Vec<String>,
  /// `(workflow_id, node_id, error)` for triggers that could not be set up.
  /// A node id of `""` means the whole workflow was rejected.
  pub failed: Vec<(String, String, TriggerError)>,
}

struct ActiveTrigger {
  instance: Box<dyn Trigger>,
  ctx: TriggerContext,
}

struct ActiveWorkflow {
  workflow: Arc<Workflow>,
  cancel: CancellationToken,
  triggers: Vec<ActiveTrigger>,
}

pub struct TriggerManager<N: ExecutionNotifier + 'static = NoopNotifier> {
  triggers: Arc<TriggerRegistry>,
  engine: Arc<WorkflowEngine<N>>,
  page: Arc<dyn PageHost>,
  workflows: Vec<WorkflowDefinition>,
  /// Compiled `urlPattern` per workflow id. Workflows whose pattern does not
  /// compile are absent and never match.
  patterns: HashMap<String, UrlPattern>,
  active: HashMap<String, ActiveWorkflow>,
  sender: mpsc::UnboundedSender<TriggerFiring>,
  receiver: mpsc::UnboundedReceiver<TriggerFiring>,
}

impl<N: ExecutionNotifier + 'static> TriggerManager<N> {
  pub fn new(
    triggers: Arc<TriggerRegistry>,
    engine: Arc<WorkflowEngine<N>>,
    page: Arc<dyn PageHost>,
  ) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      triggers,
      engine,
      page,
      workflows: Vec::new(),
      patterns: HashMap::new(),
      active: HashMap::new(),
      sender,
      receiver,
    }
  }

  /// Replace the known workflows and reconcile live triggers.
  pub fn set_workflows(&mut self, workflows: Vec<WorkflowDefinition>) -> ActivationReport {
    self.patterns = workflows
      .iter()
      .filter_map(|w| match UrlPattern::new(&w.url_pattern) {
        Ok(pattern) => Some((w.id.clone(), pattern)),
        Err(e) => {
          warn!(workflow_id = %w.id, pattern = %w.url_pattern, error = %e, "invalid_url_pattern");
          None
        }
      })
      .collect();
    self.workflows = workflows;
    self.refresh()
  }

  /// Reconcile live triggers against the current workflows and page URL.
  ///
  /// Workflows that still match and are unchanged keep their triggers; a
  /// changed definition is torn down and set up again.
  #[instrument(name = "trigger_refresh", skip_all)]
  pub fn refresh(&mut self) -> ActivationReport {
    let url = self.page.url();
    let wanted: Vec<WorkflowDefinition> = self
      .workflows
      .iter()
      .filter(|w| {
        w.enabled
          && self
            .patterns
            .get(&w.id)
            .is_some_and(|pattern| pattern.matches(&url))
      })
      .cloned()
      .collect();

    let mut report = ActivationReport::default();

    let mut stale: Vec<String> = self
      .active
      .iter()
      .filter(|(id, active)| {
        !wanted
          .iter()
          .any(|w| &w.id == *id && w == active.workflow.definition())
      })
      .map(|(id, _)| id.clone())
      .collect();
    stale.sort();
    for id in stale {
      self.deactivate(&id);
      report.deactivated.push(id);
    }

    for definition in wanted {
      if self.active.contains_key(&definition.id) {
        continue;
      }
      let id = definition.id.clone();
      match self.activate(definition, &mut report) {
        Ok(()) => report.activated.push(id),
        Err(e) => {
          warn!(workflow_id = %id, error = %e, "workflow_rejected");
          report.failed.push((id, String::new(), e));
        }
      }
    }

    report
  }

  fn activate(
    &mut self,
    definition: WorkflowDefinition,
    report: &mut ActivationReport,
  ) -> Result<(), TriggerError> {
    let workflow = Arc::new(Workflow::new(definition)?);
    let cancel = CancellationToken::new();
    let mut triggers = Vec::new();

    for node_id in workflow.graph().entry_points() {
      let node = workflow.node(node_id)?;
      let ctx = TriggerContext::new(
        workflow.id(),
        node.id.as_str(),
        Arc::clone(&self.page),
        cancel.child_token(),
        self.sender.clone(),
      );

      match self.setup_trigger(&node.data.type_id, &node.data.config, &ctx) {
        Ok(instance) => {
          info!(workflow_id = %workflow.id(), node_id = %node.id, trigger = %node.data.type_id, "trigger_activated");
          triggers.push(ActiveTrigger { instance, ctx });
        }
        Err(e) => {
          warn!(workflow_id = %workflow.id(), node_id = %node.id, error = %e, "trigger_setup_failed");
          report
            .failed
            .push((workflow.id().to_string(), node.id.clone(), e));
        }
      }
    }

    self.active.insert(
      workflow.id().to_string(),
      ActiveWorkflow {
        workflow,
        cancel,
        triggers,
      },
    );
    Ok(())
  }

  fn setup_trigger(
    &self,
    type_id: &str,
    config: &serde_json::Map<String, serde_json::Value>,
    ctx: &TriggerContext,
  ) -> Result<Box<dyn Trigger>, TriggerError> {
    let descriptor = self.triggers.get(type_id)?;
    let config = schema::normalize(&descriptor.config_schema, config);
    schema::validate(&descriptor.config_schema, &config)?;

    let instance = descriptor.instantiate();
    if let Err(e) = instance.setup(config, ctx) {
      ctx.cancel.cancel();
      instance.cleanup(ctx);
      return Err(e);
    }
    Ok(instance)
  }

  /// Tear down a workflow's triggers and abort its running executions.
  pub fn deactivate(&mut self, workflow_id: &str) -> bool {
    let Some(active) = self.active.remove(workflow_id) else {
      return false;
    };
    active.cancel.cancel();
    for trigger in &active.triggers {
      trigger.instance.cleanup(&trigger.ctx);
      info!(workflow_id = %workflow_id, node_id = %trigger.ctx.node_id, "trigger_deactivated");
    }
    true
  }

  /// Tear down everything, as on page unload.
  pub fn shutdown(&mut self) {
    let mut ids: Vec<String> = self.active.keys().cloned().collect();
    ids.sort();
    for id in ids {
      self.deactivate(&id);
    }
  }

  pub fn is_active(&self, workflow_id: &str) -> bool {
    self.active.contains_key(workflow_id)
  }

  /// Ids of active workflows, sorted.
  pub fn active_workflows(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self.active.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
  }

  /// Wait for the next trigger firing.
  pub async fn next_firing(&mut self) -> Option<TriggerFiring> {
    self.receiver.recv().await
  }

  /// Start an execution for a firing.
  ///
  /// Every firing gets its own execution; concurrent firings of one trigger
  /// are neither serialized nor deduplicated. Returns `None` when the
  /// workflow is no longer active.
  pub fn dispatch(
    &self,
    firing: TriggerFiring,
  ) -> Option<JoinHandle<Result<ExecutionResult, ExecutionError>>> {
    let Some(active) = self.active.get(&firing.workflow_id) else {
      debug!(workflow_id = %firing.workflow_id, node_id = %firing.node_id, "firing_dropped");
      return None;
    };

    let engine = Arc::clone(&self.engine);
    let workflow = Arc::clone(&active.workflow);
    let cancel = active.cancel.child_token();

    Some(tokio::spawn(async move {
      let result = engine
        .execute(&workflow, &firing.node_id, firing.data, cancel)
        .await;
      if let Err(e) = &result {
        warn!(workflow_id = %firing.workflow_id, node_id = %firing.node_id, error = %e, "execution_not_started");
      }
      result
    }))
  }

  /// Dispatch firings and follow URL changes until cancelled or the page
  /// unloads, then tear everything down.
  pub async fn run(&mut self, cancel: CancellationToken) {
    let mut page_events = self.page.subscribe();

    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        Some(firing) = self.receiver.recv() => {
          self.dispatch(firing);
        }
        event = page_events.recv() => match event {
          Ok(PageEvent::UrlChanged { url }) => {
            info!(url = %url, "page_url_changed");
            self.refresh();
          }
          Ok(PageEvent::Unloaded) | Err(RecvError::Closed) => break,
          Ok(_) => {}
          Err(RecvError::Lagged(skipped)) => warn!(skipped, "page_events_lagged"),
        }
      }
    }

    self.shutdown();
  }
}

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;

use houdin_bridge::{BackgroundDispatcher, InProcessTransport, MessageKind, ReqwestHttpHandler};
use houdin_config::WorkflowDefinition;
use houdin_runtime::actions::builtin_actions;
use houdin_runtime::{FakePage, NodeStatus, RuntimeConfig, Services, WorkflowEngine};
use houdin_store::{
  HttpRemoteApi, JsonFileStorage, LocalStore, SessionStore, SyncOutcome, SyncReconciler,
};
use houdin_trigger::triggers::builtin_triggers;
use houdin_workflow::Workflow;

/// Houdin - browser workflow automation, run headless
#[derive(Parser)]
#[command(name = "houdin")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.houdin)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a workflow against a simulated page
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// URL of the simulated page
    #[arg(long, default_value = "about:blank")]
    url: String,

    /// Trigger node to start from (default: the first trigger)
    #[arg(long, conflicts_with = "node")]
    trigger: Option<String>,

    /// Run a single action node instead of the whole graph
    #[arg(long)]
    node: Option<String>,
  },

  /// Check graph structure and node configuration
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Print the trigger or action catalogue as JSON
  Registry {
    #[arg(value_enum, default_value_t = Catalogue::Actions)]
    kind: Catalogue,
  },

  /// Manage workflows in the local store
  Workflows {
    #[command(subcommand)]
    command: WorkflowCommand,
  },

  /// Reconcile the local store with the remote
  Sync {
    /// Base URL of the sync API
    #[arg(long, env = "HOUDIN_API_URL")]
    api_url: String,
  },
}

#[derive(Subcommand)]
enum WorkflowCommand {
  /// List stored workflows
  List,
  /// Add a workflow file to the store
  Import { workflow_file: PathBuf },
  /// Delete a stored workflow
  Remove { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Catalogue {
  Actions,
  Triggers,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".houdin"),
  };

  let Some(command) = cli.command else {
    println!("houdin - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run {
        workflow_file,
        url,
        trigger,
        node,
      } => run(&workflow_file, url, trigger, node, &data_dir).await,
      Commands::Validate { workflow_file } => validate(&workflow_file).await,
      Commands::Registry { kind } => print_registry(kind),
      Commands::Workflows { command } => manage_workflows(command, &data_dir).await,
      Commands::Sync { api_url } => sync(&api_url, &data_dir).await,
    }
  })
}

async fn load_definition(path: &Path) -> Result<WorkflowDefinition> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

async fn open_store(data_dir: &Path) -> Result<(LocalStore, Arc<JsonFileStorage>)> {
  let storage = Arc::new(JsonFileStorage::new(data_dir));
  let store = LocalStore::open(storage.clone())
    .await
    .with_context(|| format!("failed to open store in {}", data_dir.display()))?;
  Ok((store, storage))
}

async fn run(
  workflow_file: &Path,
  url: String,
  trigger: Option<String>,
  node: Option<String>,
  data_dir: &Path,
) -> Result<()> {
  let definition = load_definition(workflow_file).await?;
  let workflow = Workflow::new(definition).context("invalid workflow")?;
  eprintln!("Loaded workflow: {}", workflow.definition().name);

  let payload = read_payload_from_stdin()?;

  let config = RuntimeConfig::default();
  let http = ReqwestHttpHandler::new(config.bridge_timeout).context("failed to build HTTP client")?;
  let mut dispatcher = BackgroundDispatcher::new();
  dispatcher.register(MessageKind::HttpRequest, Arc::new(http));
  let bridge = InProcessTransport::connect(dispatcher, config.bridge_timeout);

  let (store, _) = open_store(data_dir).await?;
  let page = Arc::new(FakePage::new(url));
  let services = Services::new(page.clone(), Arc::new(bridge), Arc::new(store.credentials()));
  let engine = WorkflowEngine::new(Arc::new(builtin_actions()), services, config);
  let cancel = CancellationToken::new();

  if let Some(node_id) = node {
    let node = workflow.node(&node_id)?;
    let output = engine
      .execute_node(node, payload, cancel)
      .await
      .with_context(|| format!("node '{}' failed", node_id))?;
    eprintln!("Emitted on: {}", output.handle);
    println!("{}", serde_json::to_string_pretty(&output.data)?);
    return Ok(());
  }

  let trigger_id = match trigger {
    Some(id) => id,
    None => workflow
      .definition()
      .trigger_nodes()
      .next()
      .map(|n| n.id.clone())
      .context("workflow has no trigger node")?,
  };

  let result = engine
    .execute(&workflow, &trigger_id, payload, cancel)
    .await
    .context("workflow execution failed")?;

  eprintln!("Execution completed: {}", result.execution_id);
  eprintln!("Nodes executed: {}", result.node_results.len());
  for (id, node_result) in &result.node_results {
    match &node_result.status {
      NodeStatus::Succeeded { handle } => eprintln!("  {} -> {}", id, handle),
      NodeStatus::Failed { error } => eprintln!("  {} failed: {}", id, error),
      NodeStatus::TimedOut => eprintln!("  {} timed out", id),
      NodeStatus::Cancelled => eprintln!("  {} cancelled", id),
    }
  }
  for modal in page.modals() {
    eprintln!("[modal] {}: {}", modal.title, modal.content);
  }
  for notification in page.notifications() {
    eprintln!("[notification] {}: {}", notification.title, notification.message);
  }

  let output: serde_json::Map<String, serde_json::Value> = result
    .node_results
    .into_iter()
    .filter_map(|(id, r)| r.data.map(|data| (id, data)))
    .collect();

  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

async fn validate(workflow_file: &Path) -> Result<()> {
  let definition = load_definition(workflow_file).await?;
  let actions = builtin_actions();
  let triggers = builtin_triggers();

  let mut problems = Vec::new();
  for node in &definition.nodes {
    let report = if node.is_trigger() {
      triggers.validate_config(&node.data.type_id, &node.data.config)
    } else {
      actions.validate_config(&node.data.type_id, &node.data.config)
    };
    match report {
      Ok(report) => {
        for (property, message) in report.errors.into_iter().flatten() {
          problems.push(format!("{}: {} {}", node.id, property, message));
        }
      }
      Err(e) => problems.push(format!("{}: {}", node.id, e)),
    }
  }

  match Workflow::new(definition) {
    Ok(workflow) => {
      for node_id in workflow.unreachable_nodes() {
        eprintln!("warning: {}: not reachable from any trigger", node_id);
      }
    }
    Err(e) => problems.push(e.to_string()),
  }

  if problems.is_empty() {
    println!("ok");
    return Ok(());
  }
  for problem in &problems {
    eprintln!("{}", problem);
  }
  bail!("{} problem(s) found", problems.len())
}

fn print_registry(kind: Catalogue) -> Result<()> {
  let catalogue = match kind {
    Catalogue::Actions => builtin_actions().get_all_static(),
    Catalogue::Triggers => builtin_triggers().get_all_static(),
  };
  println!("{}", serde_json::to_string_pretty(&catalogue)?);
  Ok(())
}

async fn manage_workflows(command: WorkflowCommand, data_dir: &Path) -> Result<()> {
  let (store, _) = open_store(data_dir).await?;
  let workflows = store.workflows();

  match command {
    WorkflowCommand::List => {
      for wf in workflows.list() {
        let state = if wf.enabled { "enabled" } else { "disabled" };
        println!("{}\t{}\t{}\t{}", wf.id, state, wf.url_pattern, wf.name);
      }
    }
    WorkflowCommand::Import { workflow_file } => {
      let definition = load_definition(&workflow_file).await?;
      Workflow::new(definition.clone()).context("invalid workflow")?;
      let created = workflows.create(definition).await?;
      info!(workflow_id = %created.id, "workflow_imported");
    }
    WorkflowCommand::Remove { id } => {
      workflows
        .delete(&id)
        .await
        .with_context(|| format!("failed to delete workflow '{}'", id))?;
    }
  }

  Ok(())
}

async fn sync(api_url: &str, data_dir: &Path) -> Result<()> {
  let (store, storage) = open_store(data_dir).await?;
  let remote = HttpRemoteApi::new(api_url).context("failed to build sync client")?;
  let reconciler = SyncReconciler::new(&store, SessionStore::new(storage), Arc::new(remote));

  match reconciler.sync().await.context("sync failed")? {
    SyncOutcome::Synced(report) => {
      eprintln!(
        "Pulled {}, removed {}, pushed {} update(s) and {} delete(s)",
        report.pulled, report.removed, report.pushed_updates, report.pushed_deletes
      );
    }
    SyncOutcome::Skipped => eprintln!("Sync skipped: no account with sync enabled"),
  }

  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
  }
}

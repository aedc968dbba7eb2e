use std::collections::{HashMap, HashSet, VecDeque};

use houdin_config::{WorkflowDefinition, WorkflowNode};

use crate::error::WorkflowError;
use crate::graph::Graph;

/// A workflow whose graph has been validated and indexed.
#[derive(Debug, Clone)]
pub struct Workflow {
  definition: WorkflowDefinition,
  graph: Graph,
}

impl Workflow {
  /// Validate a definition and build its graph.
  pub fn new(definition: WorkflowDefinition) -> Result<Self, WorkflowError> {
    let node_ids = collect_node_ids(&definition)?;
    validate_connections(&definition, &node_ids)?;

    let graph = Graph::new(&definition.nodes, &definition.connections);
    detect_cycle(&definition, &graph)?;

    if graph.entry_points().is_empty() {
      return Err(WorkflowError::NoTriggers);
    }

    Ok(Self { definition, graph })
  }

  pub fn id(&self) -> &str {
    &self.definition.id
  }

  pub fn definition(&self) -> &WorkflowDefinition {
    &self.definition
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a node by ID.
  pub fn node(&self, node_id: &str) -> Result<&WorkflowNode, WorkflowError> {
    self
      .definition
      .node(node_id)
      .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))
  }

  /// Action nodes no trigger can reach, in declaration order. They are valid
  /// but never run.
  pub fn unreachable_nodes(&self) -> Vec<&str> {
    let mut reachable: HashSet<String> = HashSet::new();
    for entry in self.graph.entry_points() {
      reachable.extend(self.graph.reachable_from(entry));
    }
    self
      .definition
      .nodes
      .iter()
      .filter(|n| !n.is_trigger() && !reachable.contains(&n.id))
      .map(|n| n.id.as_str())
      .collect()
  }

  pub fn into_definition(self) -> WorkflowDefinition {
    self.definition
  }
}

fn collect_node_ids(definition: &WorkflowDefinition) -> Result<HashSet<&str>, WorkflowError> {
  let mut node_ids = HashSet::new();
  for node in &definition.nodes {
    if !node_ids.insert(node.id.as_str()) {
      return Err(WorkflowError::DuplicateNodeId(node.id.clone()));
    }
  }
  Ok(node_ids)
}

fn validate_connections(
  definition: &WorkflowDefinition,
  node_ids: &HashSet<&str>,
) -> Result<(), WorkflowError> {
  for conn in &definition.connections {
    for endpoint in [&conn.source, &conn.target] {
      if !node_ids.contains(endpoint.as_str()) {
        return Err(WorkflowError::DanglingConnection {
          connection_id: conn.id.clone(),
          node_id: endpoint.clone(),
        });
      }
    }

    let target_is_trigger = definition.node(&conn.target).is_some_and(|n| n.is_trigger());
    if target_is_trigger {
      return Err(WorkflowError::TriggerHasIncoming(conn.target.clone()));
    }
  }
  Ok(())
}

/// Kahn's algorithm over the indexed graph. Nodes left with incoming edges
/// after every source has been peeled off sit on or behind a cycle; the first
/// one (in declaration order) that can reach itself is reported.
fn detect_cycle(definition: &WorkflowDefinition, graph: &Graph) -> Result<(), WorkflowError> {
  let mut in_degree: HashMap<&str, usize> = definition
    .nodes
    .iter()
    .map(|n| (n.id.as_str(), graph.upstream(&n.id).len()))
    .collect();

  let mut queue: VecDeque<&str> = definition
    .nodes
    .iter()
    .map(|n| n.id.as_str())
    .filter(|id| in_degree.get(id) == Some(&0))
    .collect();

  while let Some(id) = queue.pop_front() {
    for target in graph.downstream(id) {
      if let Some(degree) = in_degree.get_mut(target) {
        *degree -= 1;
        if *degree == 0 {
          queue.push_back(target);
        }
      }
    }
  }

  let remaining: Vec<&str> = definition
    .nodes
    .iter()
    .map(|n| n.id.as_str())
    .filter(|id| in_degree.get(id).is_some_and(|d| *d > 0))
    .collect();

  let on_cycle = remaining
    .iter()
    .find(|id| graph.reachable_from(id).contains(**id))
    .or(remaining.first());

  match on_cycle {
    Some(id) => Err(WorkflowError::CycleDetected(id.to_string())),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use houdin_config::WorkflowConnection;
  use serde_json::json;

  fn definition(nodes: Vec<WorkflowNode>, connections: Vec<WorkflowConnection>) -> WorkflowDefinition {
    WorkflowDefinition {
      id: "wf".to_string(),
      name: "Test".to_string(),
      description: None,
      url_pattern: "*".to_string(),
      enabled: true,
      nodes,
      connections,
      variables: Default::default(),
      modified_at: 0,
    }
  }

  #[test]
  fn test_valid_workflow() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("a", "wait", json!({})),
      ],
      vec![WorkflowConnection::new("c1", "t", "a")],
    );
    let wf = Workflow::new(def).unwrap();
    assert_eq!(wf.id(), "wf");
    assert_eq!(wf.graph().successors("t", "output"), vec!["a"]);
  }

  #[test]
  fn test_dangling_connection() {
    let def = definition(
      vec![WorkflowNode::trigger("t", "page-load", json!({}))],
      vec![WorkflowConnection::new("c1", "t", "missing")],
    );
    assert_eq!(
      Workflow::new(def).unwrap_err(),
      WorkflowError::DanglingConnection {
        connection_id: "c1".to_string(),
        node_id: "missing".to_string(),
      }
    );
  }

  #[test]
  fn test_duplicate_node_id() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("t", "wait", json!({})),
      ],
      vec![],
    );
    assert_eq!(
      Workflow::new(def).unwrap_err(),
      WorkflowError::DuplicateNodeId("t".to_string())
    );
  }

  #[test]
  fn test_cycle_detected() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("a", "wait", json!({})),
        WorkflowNode::action("b", "wait", json!({})),
      ],
      vec![
        WorkflowConnection::new("c1", "t", "a"),
        WorkflowConnection::new("c2", "a", "b"),
        WorkflowConnection::new("c3", "b", "a"),
      ],
    );
    assert_eq!(
      Workflow::new(def).unwrap_err(),
      WorkflowError::CycleDetected("a".to_string())
    );
  }

  #[test]
  fn test_cycle_reported_on_the_loop_not_behind_it() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("after", "wait", json!({})),
        WorkflowNode::action("a", "wait", json!({})),
        WorkflowNode::action("b", "wait", json!({})),
      ],
      vec![
        WorkflowConnection::new("c1", "t", "a"),
        WorkflowConnection::new("c2", "a", "b"),
        WorkflowConnection::new("c3", "b", "a"),
        WorkflowConnection::new("c4", "b", "after"),
      ],
    );
    assert_eq!(
      Workflow::new(def).unwrap_err(),
      WorkflowError::CycleDetected("a".to_string())
    );
  }

  #[test]
  fn test_self_loop() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("a", "wait", json!({})),
      ],
      vec![
        WorkflowConnection::new("c1", "t", "a"),
        WorkflowConnection::new("c2", "a", "a").on_handle("true"),
      ],
    );
    assert_eq!(
      Workflow::new(def).unwrap_err(),
      WorkflowError::CycleDetected("a".to_string())
    );
  }

  #[test]
  fn test_long_chain_does_not_overflow() {
    let mut nodes = vec![WorkflowNode::trigger("t", "page-load", json!({}))];
    let mut connections = Vec::new();
    let mut previous = "t".to_string();
    for i in 0..20_000 {
      let id = format!("n{}", i);
      nodes.push(WorkflowNode::action(&id, "wait", json!({})));
      connections.push(WorkflowConnection::new(&format!("c{}", i), &previous, &id));
      previous = id;
    }
    let wf = Workflow::new(definition(nodes, connections)).unwrap();
    assert!(wf.unreachable_nodes().is_empty());
  }

  #[test]
  fn test_unreachable_nodes() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("a", "wait", json!({})),
        WorkflowNode::action("orphan", "wait", json!({})),
        WorkflowNode::action("orphan_child", "wait", json!({})),
      ],
      vec![
        WorkflowConnection::new("c1", "t", "a"),
        WorkflowConnection::new("c2", "orphan", "orphan_child"),
      ],
    );
    let wf = Workflow::new(def).unwrap();
    assert_eq!(wf.unreachable_nodes(), vec!["orphan", "orphan_child"]);
  }

  #[test]
  fn test_trigger_with_incoming() {
    let def = definition(
      vec![
        WorkflowNode::trigger("t", "page-load", json!({})),
        WorkflowNode::action("a", "wait", json!({})),
      ],
      vec![WorkflowConnection::new("c1", "a", "t")],
    );
    assert_eq!(
      Workflow::new(def).unwrap_err(),
      WorkflowError::TriggerHasIncoming("t".to_string())
    );
  }

  #[test]
  fn test_no_triggers() {
    let def = definition(vec![WorkflowNode::action("a", "wait", json!({}))], vec![]);
    assert_eq!(Workflow::new(def).unwrap_err(), WorkflowError::NoTriggers);
  }
}

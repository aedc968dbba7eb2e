use std::collections::{HashMap, HashSet};

use houdin_config::{WorkflowConnection, WorkflowNode};

/// An outgoing edge, keyed by the handle it leaves from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
  pub source_handle: String,
  pub target: String,
}

/// Graph structure for traversal and analysis.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// node_id -> outgoing edges (all handles).
  adjacency: HashMap<String, Vec<Outgoing>>,
  /// node_id -> upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Trigger nodes, in declaration order.
  entry_points: Vec<String>,
  /// Nodes with multiple incoming connections.
  join_points: HashSet<String>,
}

impl Graph {
  /// Build a graph from nodes and connections.
  ///
  /// Connections whose endpoints are missing are skipped here; [`Workflow`](crate::Workflow)
  /// rejects them before a graph is ever built for execution.
  pub fn new(nodes: &[WorkflowNode], connections: &[WorkflowConnection]) -> Self {
    let mut adjacency: HashMap<String, Vec<Outgoing>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      adjacency.entry(node.id.clone()).or_default();
      reverse_adjacency.entry(node.id.clone()).or_default();
    }

    for conn in connections {
      if !adjacency.contains_key(&conn.source) || !adjacency.contains_key(&conn.target) {
        continue;
      }
      adjacency
        .entry(conn.source.clone())
        .or_default()
        .push(Outgoing {
          source_handle: conn.source_handle.clone(),
          target: conn.target.clone(),
        });
      reverse_adjacency
        .entry(conn.target.clone())
        .or_default()
        .push(conn.source.clone());
    }

    let entry_points: Vec<String> = nodes
      .iter()
      .filter(|n| n.is_trigger())
      .map(|n| n.id.clone())
      .collect();

    let join_points: HashSet<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      adjacency,
      reverse_adjacency,
      entry_points,
      join_points,
    }
  }

  /// Trigger nodes (execution entry points).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// All outgoing edges of a node, whatever the handle.
  pub fn outgoing(&self, node_id: &str) -> &[Outgoing] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Targets connected to `handle` of `node_id`.
  ///
  /// Edges on other handles are not returned, so an unfired branch is never
  /// reached.
  pub fn successors(&self, node_id: &str, handle: &str) -> Vec<&str> {
    self
      .outgoing(node_id)
      .iter()
      .filter(|o| o.source_handle == handle)
      .map(|o| o.target.as_str())
      .collect()
  }

  /// Get downstream node ids for a node, across all handles.
  pub fn downstream(&self, node_id: &str) -> Vec<&str> {
    self
      .outgoing(node_id)
      .iter()
      .map(|o| o.target.as_str())
      .collect()
  }

  /// Get upstream nodes for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if a node is a join point (has multiple incoming edges).
  pub fn is_join_point(&self, node_id: &str) -> bool {
    self.join_points.contains(node_id)
  }

  /// Node ids reachable from `start` over any handle, excluding `start`.
  pub fn reachable_from(&self, start: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = self.downstream(start);
    while let Some(id) = stack.pop() {
      if seen.insert(id.to_string()) {
        stack.extend(self.downstream(id));
      }
    }
    seen
  }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges.
//!
//! The graph owns node lifetime. Nodes are kept in insertion order in a
//! single id-indexed map, so the lookup index and the ordered list cannot
//! disagree. Every edge's endpoints are nodes of this graph.

use crate::connection::{Edge, EdgeId};
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Name given to graphs created without one
pub const DEFAULT_GRAPH_NAME: &str = "Untitled";

/// Offset applied to duplicated nodes
pub const DEFAULT_DUPLICATE_OFFSET: Position = [20.0, 20.0];

/// Canvas position of a node
pub type Position = [f32; 2];

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

/// A node together with its canvas position
#[derive(Debug)]
pub struct NodeInSpace {
    /// The node
    pub node: Node,
    /// Position in the graph UI
    pub pos: Position,
}

/// A live dataflow graph
#[derive(Debug)]
pub struct Graph {
    id: GraphId,
    /// Graph name
    pub name: String,
    /// Nodes in insertion order, indexed by id
    pub(crate) nodes: IndexMap<NodeId, NodeInSpace>,
    /// Edges in insertion order
    pub(crate) edges: IndexMap<EdgeId, Edge>,
    disposed: bool,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            disposed: false,
        }
    }

    /// Graph id
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Add a node at a position and fire its `on_add_to_graph` hook.
    ///
    /// A node already holding the same id is removed first, edges included.
    pub fn add_node(&mut self, node: Node, pos: Position) -> &mut NodeInSpace {
        let id = node.id().clone();
        if self.nodes.contains_key(&id) {
            tracing::warn!(node = %id, "replacing node with duplicate id");
            self.remove_node(&id);
        }
        tracing::debug!(node = %id, class = node.core().class().registry_name(), "adding node");
        self.nodes.insert(id.clone(), NodeInSpace { node, pos });
        let entry = &mut self.nodes[&id];
        entry.node.attach();
        entry
    }

    /// Remove a node: its edges first, then its `will_be_removed` hook.
    ///
    /// Removing an absent node is a no-op.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<NodeInSpace> {
        let entry = self.nodes.get(node_id)?;
        let edge_ids: Vec<EdgeId> = entry
            .node
            .core()
            .inputs()
            .iter()
            .chain(entry.node.core().outputs())
            .map(|c| c.id.clone())
            .collect();
        for edge_id in edge_ids {
            self.remove_edge(&edge_id);
        }
        if let Some(entry) = self.nodes.get_mut(node_id) {
            entry.node.teardown();
        }
        tracing::debug!(node = %node_id, "removed node");
        self.nodes.shift_remove(node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id).map(|e| &e.node)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id).map(|e| &mut e.node)
    }

    /// Get a node and its position
    pub fn entry(&self, node_id: &NodeId) -> Option<&NodeInSpace> {
        self.nodes.get(node_id)
    }

    /// Get all nodes with positions, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInSpace> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether a node is part of this graph
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Position of a node
    pub fn position(&self, node_id: &NodeId) -> Option<Position> {
        self.nodes.get(node_id).map(|e| e.pos)
    }

    /// Move a node; returns false if it is not in the graph
    pub fn set_position(&mut self, node_id: &NodeId, pos: Position) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(entry) => {
                entry.pos = pos;
                true
            }
            None => false,
        }
    }

    /// Add an edge and attach it to both endpoint nodes.
    ///
    /// The target immediately receives the source's current value for the
    /// connected port.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        let connection = edge.connection().clone();
        for node_id in [&connection.from, &connection.to] {
            if !self.nodes.contains_key(node_id) {
                return Err(GraphError::NodeNotFound(node_id.clone()));
            }
        }
        tracing::debug!(
            edge = %connection.id,
            "connecting {}.{} -> {}.{}",
            connection.from, connection.from_port, connection.to, connection.to_port
        );
        self.edges.insert(connection.id.clone(), edge);
        self.nodes[&connection.from].node.add_output(&connection);
        self.connect_input(&connection);
        Ok(connection.id)
    }

    /// Connect two ports with a new edge
    pub fn connect(
        &mut self,
        from: &NodeId,
        from_port: &str,
        to: &NodeId,
        to_port: &str,
    ) -> Result<EdgeId, GraphError> {
        self.add_edge(Edge::new(from.clone(), from_port, to.clone(), to_port))
    }

    /// Remove an edge and detach it from both endpoints.
    ///
    /// Removing an absent edge is a no-op.
    pub fn remove_edge(&mut self, edge_id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(edge_id)?;
        if let Some(entry) = self.nodes.get_mut(edge.from()) {
            entry.node.remove_output(edge_id);
        }
        if let Some(entry) = self.nodes.get_mut(edge.to()) {
            entry.node.remove_input(edge_id);
        }
        tracing::debug!(edge = %edge_id, "removed edge");
        Some(edge)
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: &EdgeId) -> Option<&Edge> {
        self.edges.get(edge_id)
    }

    /// Get a mutable edge by ID
    pub fn edge_mut(&mut self, edge_id: &EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(edge_id)
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get edges touching a node
    pub fn edges_for_node<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges
            .values()
            .filter(move |e| e.connection().involves_node(node_id))
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Duplicate nodes using the default offset
    pub fn duplicate(&mut self, node_ids: &[NodeId]) -> Result<Vec<NodeId>, GraphError> {
        self.duplicate_with_offset(node_ids, DEFAULT_DUPLICATE_OFFSET)
    }

    /// Clone nodes through their persisted form, giving each a fresh id.
    ///
    /// Edges are recreated only when both endpoints were duplicated; edges
    /// crossing the boundary of the set are dropped. Unknown ids are skipped.
    pub fn duplicate_with_offset(
        &mut self,
        node_ids: &[NodeId],
        offset: Position,
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut mapping: IndexMap<NodeId, NodeId> = IndexMap::new();
        for node_id in node_ids {
            if mapping.contains_key(node_id) {
                continue;
            }
            let Some(entry) = self.nodes.get(node_id) else {
                tracing::warn!(node = %node_id, "cannot duplicate missing node");
                continue;
            };
            let record = entry.node.duplicate_record(entry.pos);
            let copy = Node::from_record(entry.node.core().class(), &record);
            let pos = [entry.pos[0] + offset[0], entry.pos[1] + offset[1]];
            mapping.insert(node_id.clone(), record.id.clone());
            self.add_node(copy, pos);
        }

        let inner: Vec<Edge> = self
            .edges
            .values()
            .filter_map(|edge| {
                let from = mapping.get(edge.from())?;
                let to = mapping.get(edge.to())?;
                Some(Edge::new(from.clone(), edge.from_port(), to.clone(), edge.to_port()))
            })
            .collect();
        for edge in inner {
            self.add_edge(edge)?;
        }

        Ok(mapping.into_values().collect())
    }

    /// Sever every edge, remove every node, and mark the graph disposed.
    ///
    /// Calling this more than once is harmless.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let edge_ids: Vec<EdgeId> = self.edges.keys().cloned().collect();
        for edge_id in edge_ids {
            self.remove_edge(&edge_id);
        }
        let node_ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for node_id in node_ids {
            self.remove_node(&node_id);
        }
        self.nodes.clear();
        self.edges.clear();
        self.disposed = true;
        tracing::info!("Disposed graph '{}'", self.name);
    }

    /// Whether [`Graph::dispose`] has run
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Ids of nodes with no incoming edges
    pub fn source_nodes(&self) -> Vec<NodeId> {
        let targets: HashSet<&NodeId> = self.edges.values().map(Edge::to).collect();
        self.nodes
            .keys()
            .filter(|id| !targets.contains(id))
            .cloned()
            .collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPH_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::{doubler_class, source_class};
    use crate::node::{NodeBehavior, NodeCore, NodeOptions};
    use crate::schema::{NodeClass, NodeSchema};
    use crate::types::TypeRegistry;
    use std::sync::atomic::AtomicU32;
    use std::sync::{Arc, Mutex};

    fn named(class: &Arc<NodeClass>, id: &str) -> Node {
        Node::with_options(
            class,
            NodeOptions {
                id: Some(NodeId::from(id)),
                ..Default::default()
            },
        )
    }

    fn chain() -> Graph {
        let types = TypeRegistry::with_builtins().unwrap();
        let source = source_class(&types);
        let doubler = doubler_class(&types, Arc::new(AtomicU32::new(0)));
        let mut graph = Graph::new("chain");
        graph.add_node(named(&source, "a"), [0.0, 0.0]);
        graph.add_node(named(&doubler, "b"), [100.0, 0.0]);
        graph.add_node(named(&doubler, "c"), [200.0, 0.0]);
        graph.connect(&"a".into(), "out", &"b".into(), "in").unwrap();
        graph.connect(&"b".into(), "doubled", &"c".into(), "in").unwrap();
        graph
    }

    #[test]
    fn test_add_edge_requires_known_nodes() {
        let mut graph = chain();
        let err = graph.connect(&"a".into(), "out", &"zz".into(), "in").unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(id) if id == NodeId::from("zz")));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_remove_node_cascades_only_its_edges() {
        let mut graph = chain();
        let types = TypeRegistry::with_builtins().unwrap();
        let source = source_class(&types);
        graph.add_node(named(&source, "d"), [0.0, 100.0]);
        let doubler = doubler_class(&types, Arc::new(AtomicU32::new(0)));
        graph.add_node(named(&doubler, "e"), [100.0, 100.0]);
        let unrelated = graph.connect(&"d".into(), "out", &"e".into(), "in").unwrap();

        let removed = graph.remove_node(&"b".into());
        assert!(removed.is_some());
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edge(&unrelated).is_some());
        assert!(graph.node(&"a".into()).unwrap().core().outputs().is_empty());
        assert!(graph.node(&"c".into()).unwrap().core().inputs().is_empty());

        assert!(graph.remove_node(&"b".into()).is_none());
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn test_duplicate_id_replaces_node_and_its_edges() {
        let mut graph = chain();
        let types = TypeRegistry::with_builtins().unwrap();
        let doubler = doubler_class(&types, Arc::new(AtomicU32::new(0)));
        graph.add_node(named(&doubler, "b"), [0.0, 50.0]);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node(&"a".into()).unwrap().core().outputs().is_empty());
        assert!(graph.node(&"c".into()).unwrap().core().inputs().is_empty());
        assert_eq!(graph.position(&"b".into()), Some([0.0, 50.0]));

        graph.remove_node(&"b".into());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_removal_hook_runs_after_edges_are_gone() {
        struct Recorder(Arc<Mutex<Vec<usize>>>);
        impl NodeBehavior for Recorder {
            fn will_be_removed(&mut self, node: &mut NodeCore) {
                self.0.lock().unwrap().push(node.inputs().len() + node.outputs().len());
            }
        }

        let types = TypeRegistry::with_builtins().unwrap();
        let number = types.require("number").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let class = Arc::new(
            NodeClass::new("Recorder", move || Box::new(Recorder(Arc::clone(&sink))))
                .with_schema(NodeSchema::new().input("in", number)),
        );

        let mut graph = Graph::new("hooks");
        graph.add_node(named(&source_class(&types), "a"), [0.0, 0.0]);
        graph.add_node(named(&class, "r"), [0.0, 0.0]);
        graph.connect(&"a".into(), "out", &"r".into(), "in").unwrap();

        graph.remove_node(&"r".into());
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_duplicate_keeps_only_internal_edges() {
        let mut graph = chain();
        let copies = graph.duplicate(&["b".into(), "c".into()]).unwrap();

        assert_eq!(copies.len(), 2);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 3);
        assert!(!copies.contains(&"b".into()));
        assert_eq!(graph.position(&copies[0]), Some([120.0, 20.0]));

        let copied_edge = graph
            .edges()
            .find(|e| e.from() == &copies[0])
            .expect("internal edge recreated");
        assert_eq!(copied_edge.to(), &copies[1]);
        assert!(graph.edges().all(|e| e.to() != &copies[0]));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut graph = chain();
        graph.dispose();
        assert!(graph.is_disposed());
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        graph.dispose();
        assert!(graph.is_disposed());
    }

    #[test]
    fn test_source_nodes() {
        let graph = chain();
        assert_eq!(graph.source_nodes(), vec![NodeId::from("a")]);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph documents.
//!
//! A document is `{name?, nodes: [{id, type, x, y, state?, title?}],
//! edges: [{id, fromId, fromPort, toId, toPort}]}`. Only state fields are
//! persisted; props are connection-driven and rebuilt by the edges.

use crate::connection::{Edge, EdgeRecord};
use crate::error::GraphLoadError;
use crate::graph::{Graph, Position, DEFAULT_GRAPH_NAME};
use crate::node::{Node, NodeId, NodeOptions};
use crate::registry::NodeRegistry;
use crate::schema::NodeClass;
use crate::value::Payload;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Serialized graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Graph name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Nodes, in graph order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges, in graph order
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id
    pub id: NodeId,
    /// Registry name of the node class
    #[serde(rename = "type")]
    pub node_type: String,
    /// Canvas x
    #[serde(default)]
    pub x: f32,
    /// Canvas y
    #[serde(default)]
    pub y: f32,
    /// Persisted state fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Payload>,
    /// User label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl NodeRecord {
    /// Canvas position
    pub fn position(&self) -> Position {
        [self.x, self.y]
    }
}

impl Node {
    /// Persisted form of this node.
    ///
    /// A state field is written only if the schema declares it, its type
    /// has a serializer, and that serializer returns a value. A failing
    /// serializer drops that one field.
    pub fn to_record(&self, pos: Position) -> NodeRecord {
        let core = self.core();
        let mut state = Payload::new();
        for (key, ty) in &core.class().schema().state {
            let Some(value) = core.state().get(key) else {
                continue;
            };
            match ty.serialize(value) {
                Ok(Some(raw)) => {
                    state.insert(key.clone(), raw);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(node = %core.id(), field = %key, "skipping state field: {}", e);
                }
            }
        }
        NodeRecord {
            id: core.id().clone(),
            node_type: core.class().registry_name().to_string(),
            x: pos[0],
            y: pos[1],
            state: (!state.is_empty()).then_some(state),
            title: core.title().map(str::to_string),
        }
    }

    /// Persisted form with a fresh id, used for copies
    pub fn duplicate_record(&self, pos: Position) -> NodeRecord {
        NodeRecord {
            id: NodeId::new(),
            ..self.to_record(pos)
        }
    }

    /// Rebuild a node from its record.
    ///
    /// Each persisted state field is run through its type's parser. Fields
    /// the schema does not declare, or that fail to parse, are skipped.
    pub fn from_record(class: &Arc<NodeClass>, record: &NodeRecord) -> Node {
        let schema = class.schema();
        let mut state = Payload::new();
        for (key, raw) in record.state.iter().flatten() {
            let Some(ty) = schema.state.get(key) else {
                tracing::warn!(node = %record.id, field = %key, "ignoring undeclared state field");
                continue;
            };
            match ty.parse(raw) {
                Ok(value) => {
                    state.insert(key.clone(), value);
                }
                Err(e) => tracing::warn!(node = %record.id, field = %key, "ignoring state field: {}", e),
            }
        }
        Node::with_options(
            class,
            NodeOptions {
                id: Some(record.id.clone()),
                title: record.title.clone(),
                state,
                props: Payload::new(),
            },
        )
    }
}

impl NodeRegistry {
    /// Rebuild a node from its record, resolving its class by registry name
    pub fn load_node(&self, record: &NodeRecord) -> Result<Node, GraphLoadError> {
        let class = self.get(&record.node_type).ok_or_else(|| {
            tracing::error!(node = %record.id, "Cannot load node: unknown type '{}'", record.node_type);
            GraphLoadError::UnknownNodeType(record.node_type.clone())
        })?;
        Ok(Node::from_record(class, record))
    }
}

impl Graph {
    /// Persisted form of the whole graph under the given name
    pub fn serialize(&self, name: &str) -> GraphRecord {
        GraphRecord {
            name: Some(name.to_string()),
            nodes: self.nodes().map(|entry| entry.node.to_record(entry.pos)).collect(),
            edges: self.edges().map(Edge::to_record).collect(),
        }
    }

    /// Serialize to pretty JSON under the graph's own name
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.serialize(&self.name))
    }

    /// Build a graph from a record.
    ///
    /// Every node is created before any edge is resolved. Connecting the
    /// edges replays the initial pulls, so props are rebuilt from state.
    pub fn load(record: &GraphRecord, registry: &NodeRegistry) -> Result<Graph, GraphLoadError> {
        Self::load_named(record, registry, DEFAULT_GRAPH_NAME)
    }

    /// Build a graph from a record, naming it `default_name` if the document
    /// has no name
    pub fn load_named(
        record: &GraphRecord,
        registry: &NodeRegistry,
        default_name: &str,
    ) -> Result<Graph, GraphLoadError> {
        let nodes = record
            .nodes
            .iter()
            .map(|r| Ok((registry.load_node(r)?, r.position())))
            .collect::<Result<Vec<_>, GraphLoadError>>()?;
        let known: HashSet<&NodeId> = record.nodes.iter().map(|r| &r.id).collect();
        let edges = record
            .edges
            .iter()
            .map(|r| Edge::load(r, |id| known.contains(id)))
            .collect::<Result<Vec<_>, GraphLoadError>>()?;

        let mut graph = Graph::new(record.name.as_deref().unwrap_or(default_name));
        for (node, pos) in nodes {
            graph.add_node(node, pos);
        }
        for edge in edges {
            // endpoints were checked above
            if let Err(e) = graph.add_edge(edge) {
                tracing::error!("Failed to attach edge: {}", e);
            }
        }
        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded graph '{}'",
            graph.name
        );
        Ok(graph)
    }

    /// Parse a JSON document and build a graph from it
    pub fn from_json(json: &str, registry: &NodeRegistry) -> Result<Graph, GraphLoadError> {
        let record: GraphRecord = serde_json::from_str(json)?;
        Self::load(&record, registry)
    }
}

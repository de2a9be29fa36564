// SPDX-License-Identifier: MIT OR Apache-2.0
//! Open graphs and the active-graph pointer.

use crate::config::EngineConfig;
use crate::error::{GraphError, GraphLoadError};
use crate::graph::{Graph, GraphId};
use crate::node::NodeId;
use crate::registry::Catalog;
use crate::serialization::GraphRecord;
use indexmap::IndexMap;
use std::sync::Arc;

/// Editing session: the catalog, settings and every open graph
#[derive(Debug)]
pub struct Session {
    catalog: Arc<Catalog>,
    config: EngineConfig,
    graphs: IndexMap<GraphId, Graph>,
    active: Option<GraphId>,
}

impl Session {
    /// Create a session with no open graphs
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            graphs: IndexMap::new(),
            active: None,
        }
    }

    /// Shared registries
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open an empty graph and make it active
    pub fn new_graph(&mut self) -> GraphId {
        let graph = Graph::new(self.config.default_graph_name.clone());
        self.insert(graph)
    }

    /// Load a graph document and make it active.
    ///
    /// Unnamed documents take the configured default name. On failure the
    /// open graphs and the active pointer are left untouched.
    pub fn open_json(&mut self, json: &str) -> Result<GraphId, GraphLoadError> {
        let graph = serde_json::from_str::<GraphRecord>(json)
            .map_err(GraphLoadError::from)
            .and_then(|record| Graph::load_named(&record, &self.catalog.nodes, &self.config.default_graph_name))
            .inspect_err(|e| {
                tracing::error!("Failed to open graph: {}", e);
            })?;
        Ok(self.insert(graph))
    }

    /// Duplicate nodes of an open graph, offset by the configured amount.
    ///
    /// Returns `None` if `id` is not open.
    pub fn duplicate(&mut self, id: GraphId, node_ids: &[NodeId]) -> Option<Result<Vec<NodeId>, GraphError>> {
        let offset = self.config.duplicate_offset;
        self.graphs
            .get_mut(&id)
            .map(|graph| graph.duplicate_with_offset(node_ids, offset))
    }

    /// Serialize an open graph under its own name
    pub fn save_json(&self, id: GraphId) -> Option<Result<String, serde_json::Error>> {
        self.graphs.get(&id).map(Graph::to_json)
    }

    fn insert(&mut self, graph: Graph) -> GraphId {
        let id = graph.id();
        tracing::info!("Opened graph '{}'", graph.name);
        self.graphs.insert(id, graph);
        self.active = Some(id);
        id
    }

    /// Id of the active graph
    pub fn active_id(&self) -> Option<GraphId> {
        self.active
    }

    /// Active graph
    pub fn active(&self) -> Option<&Graph> {
        self.active.and_then(|id| self.graphs.get(&id))
    }

    /// Active graph, mutably
    pub fn active_mut(&mut self) -> Option<&mut Graph> {
        self.active.and_then(|id| self.graphs.get_mut(&id))
    }

    /// Switch the active graph; returns false if `id` is not open
    pub fn set_active(&mut self, id: GraphId) -> bool {
        if self.graphs.contains_key(&id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Get an open graph
    pub fn graph(&self, id: GraphId) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    /// Get an open graph mutably
    pub fn graph_mut(&mut self, id: GraphId) -> Option<&mut Graph> {
        self.graphs.get_mut(&id)
    }

    /// Open graph ids in opening order
    pub fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.keys().copied()
    }

    /// Dispose and close a graph.
    ///
    /// The active pointer is cleared only if it refers to this graph.
    pub fn dispose(&mut self, id: GraphId) -> bool {
        let Some(mut graph) = self.graphs.shift_remove(&id) else {
            return false;
        };
        graph.dispose();
        if self.active == Some(id) {
            self.active = None;
        }
        true
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.
//!
//! A [`Connection`] is the plain endpoint record; nodes keep copies of it in
//! their input and output lists. An [`Edge`] is the graph-owned wire built on
//! top of a connection, carrying the visualization observer.

use crate::error::GraphLoadError;
use crate::node::NodeId;
use crate::value::{Payload, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Create a new random edge ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Endpoints of a connection between two ports
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Edge this connection belongs to
    pub id: EdgeId,
    /// Source node ID
    pub from: NodeId,
    /// Source output port key
    pub from_port: String,
    /// Target node ID
    pub to: NodeId,
    /// Target input port key
    pub to_port: String,
}

impl Connection {
    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.from == *node_id || self.to == *node_id
    }
}

/// Callback fired each time data travels over an edge
pub type EdgeObserver = Box<dyn FnMut(&Connection, u64)>;

/// A directed wire from one node's output port to another node's input port
pub struct Edge {
    connection: Connection,
    notify_count: u64,
    observer: Option<EdgeObserver>,
}

impl Edge {
    /// Create a new edge with a fresh id
    pub fn new(
        from: NodeId,
        from_port: impl Into<String>,
        to: NodeId,
        to_port: impl Into<String>,
    ) -> Self {
        Self::with_id(EdgeId::new(), from, from_port, to, to_port)
    }

    /// Create an edge with a known id
    pub fn with_id(
        id: EdgeId,
        from: NodeId,
        from_port: impl Into<String>,
        to: NodeId,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            connection: Connection {
                id,
                from,
                from_port: from_port.into(),
                to,
                to_port: to_port.into(),
            },
            notify_count: 0,
            observer: None,
        }
    }

    /// Edge id
    pub fn id(&self) -> &EdgeId {
        &self.connection.id
    }

    /// Endpoint record
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Source node
    pub fn from(&self) -> &NodeId {
        &self.connection.from
    }

    /// Source port key
    pub fn from_port(&self) -> &str {
        &self.connection.from_port
    }

    /// Target node
    pub fn to(&self) -> &NodeId {
        &self.connection.to
    }

    /// Target port key
    pub fn to_port(&self) -> &str {
        &self.connection.to_port
    }

    /// Project a source node's output payload onto the target port.
    ///
    /// The result is empty when the payload does not carry `from_port`.
    pub fn out_data_for(&self, payload: &Payload) -> Payload {
        let mut packet = Payload::new();
        if let Some(value) = payload.get(&self.connection.from_port) {
            packet.insert(self.connection.to_port.clone(), value.clone());
        }
        packet
    }

    /// Extract this edge's value from a projected packet
    pub fn in_data_for<'a>(&self, packet: &'a Payload) -> Option<&'a Value> {
        packet.get(&self.connection.to_port)
    }

    /// Record a delivery and inform the observer, if any
    pub fn notify(&mut self) {
        self.notify_count += 1;
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.connection, self.notify_count);
        }
    }

    /// Number of deliveries so far
    pub fn notify_count(&self) -> u64 {
        self.notify_count
    }

    /// Replace the observer (most recent wins)
    pub fn set_observer(&mut self, observer: EdgeObserver) {
        self.observer = Some(observer);
    }

    /// Remove the observer
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Persisted form of this edge
    pub fn to_record(&self) -> EdgeRecord {
        EdgeRecord {
            id: self.connection.id.clone(),
            from_id: self.connection.from.clone(),
            from_port: self.connection.from_port.clone(),
            to_id: self.connection.to.clone(),
            to_port: self.connection.to_port.clone(),
        }
    }

    /// Rebuild an edge from its record; both endpoints must already be known
    pub fn load(
        record: &EdgeRecord,
        contains: impl Fn(&NodeId) -> bool,
    ) -> Result<Self, GraphLoadError> {
        for node in [&record.from_id, &record.to_id] {
            if !contains(node) {
                return Err(GraphLoadError::MissingEndpoint {
                    edge: record.id.clone(),
                    node: node.clone(),
                });
            }
        }
        Ok(Self::with_id(
            record.id.clone(),
            record.from_id.clone(),
            record.from_port.clone(),
            record.to_id.clone(),
            record.to_port.clone(),
        ))
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("connection", &self.connection)
            .field("notify_count", &self.notify_count)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

/// Serialized edge, as stored in graph documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Edge id
    pub id: EdgeId,
    /// Source node id
    pub from_id: NodeId,
    /// Source port key
    pub from_port: String,
    /// Target node id
    pub to_id: NodeId,
    /// Target port key
    pub to_port: String,
}

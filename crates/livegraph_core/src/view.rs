// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canvas interaction state.
//!
//! The canvas never touches nodes directly. Dragging goes through
//! [`Graph::set_position`]; wiring goes through [`Graph::add_edge`] and
//! [`Graph::remove_edge`] once the request has been validated here.

use crate::connection::{Edge, EdgeId};
use crate::error::GraphError;
use crate::graph::{Graph, Position};
use crate::node::NodeId;
use crate::schema::SchemaSection;
use crate::types::{AttributeType, OBJECT_TYPE_NAME};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default grid size for snapping
pub const GRID_SPACING: f32 = 20.0;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port (receives data)
    Input,
    /// Output port (sends data)
    Output,
}

impl PortDirection {
    fn section(self) -> SchemaSection {
        match self {
            Self::Input => SchemaSection::Input,
            Self::Output => SchemaSection::Output,
        }
    }
}

/// One end of a connection being drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
    /// Node owning the port
    pub node: NodeId,
    /// Port key
    pub port: String,
    /// Which side of the node
    pub direction: PortDirection,
}

/// Current interaction mode
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionMode {
    /// Nothing in progress
    #[default]
    Normal,
    /// Dragging a node
    DraggingNode {
        /// Node being dragged
        node: NodeId,
        /// Position when the drag began
        start: Position,
    },
    /// Drawing a connection from a port
    CreatingConnection(PortRef),
}

/// A finished node drag
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMove {
    /// Node that moved
    pub node: NodeId,
    /// Position before the drag
    pub from: Position,
    /// Position after the drag
    pub to: Position,
}

/// Canvas controller: node dragging and connection drawing
#[derive(Debug, Clone)]
pub struct CanvasController {
    /// Current mode
    pub mode: InteractionMode,
    /// Snap dragged nodes to the grid
    pub snap_to_grid: bool,
    /// Grid size for snapping
    pub snap_size: f32,
}

impl Default for CanvasController {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasController {
    /// Create a controller in normal mode
    pub fn new() -> Self {
        Self {
            mode: InteractionMode::Normal,
            snap_to_grid: false,
            snap_size: GRID_SPACING,
        }
    }

    /// Snap a position to the grid if enabled
    pub fn snap_position(&self, pos: Position) -> Position {
        if self.snap_to_grid && self.snap_size > 0.0 {
            [
                (pos[0] / self.snap_size).round() * self.snap_size,
                (pos[1] / self.snap_size).round() * self.snap_size,
            ]
        } else {
            pos
        }
    }

    /// Begin dragging a node
    pub fn on_node_start(&mut self, graph: &Graph, node_id: &NodeId) -> Result<(), GraphError> {
        let start = graph
            .position(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        self.mode = InteractionMode::DraggingNode {
            node: node_id.clone(),
            start,
        };
        Ok(())
    }

    /// Move the dragged node; returns the applied position
    pub fn on_node_move(&mut self, graph: &mut Graph, pos: Position) -> Option<Position> {
        let InteractionMode::DraggingNode { node, .. } = &self.mode else {
            return None;
        };
        let pos = self.snap_position(pos);
        graph.set_position(node, pos).then_some(pos)
    }

    /// Finish the drag
    pub fn on_node_stop(&mut self, graph: &Graph) -> Option<NodeMove> {
        let InteractionMode::DraggingNode { node, start } = &self.mode else {
            return None;
        };
        let finished = graph.position(node).map(|to| NodeMove {
            node: node.clone(),
            from: *start,
            to,
        });
        self.mode = InteractionMode::Normal;
        finished
    }

    /// Begin drawing a connection from a port
    pub fn connector_start(
        &mut self,
        graph: &Graph,
        node_id: &NodeId,
        port: &str,
        direction: PortDirection,
    ) -> Result<(), GraphError> {
        port_type(graph, node_id, port, direction)?;
        self.mode = InteractionMode::CreatingConnection(PortRef {
            node: node_id.clone(),
            port: port.to_string(),
            direction,
        });
        Ok(())
    }

    /// Drop the connection being drawn onto a port.
    ///
    /// The two ends must be on different nodes, in opposite directions, and
    /// carry compatible types. An input accepts one edge; an existing edge
    /// into the target port is replaced.
    pub fn connector_complete(
        &mut self,
        graph: &mut Graph,
        node_id: &NodeId,
        port: &str,
    ) -> Result<EdgeId, GraphError> {
        let InteractionMode::CreatingConnection(start) = std::mem::take(&mut self.mode) else {
            return Err(GraphError::InvalidConnection("no connection in progress".into()));
        };
        if start.node == *node_id {
            return Err(GraphError::InvalidConnection("cannot connect a node to itself".into()));
        }

        let end_direction = match start.direction {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        };
        let end = PortRef {
            node: node_id.clone(),
            port: port.to_string(),
            direction: end_direction,
        };
        let (from, to) = match start.direction {
            PortDirection::Output => (start, end),
            PortDirection::Input => (end, start),
        };

        let from_ty = port_type(graph, &from.node, &from.port, PortDirection::Output)?;
        let to_ty = port_type(graph, &to.node, &to.port, PortDirection::Input)?;
        if !types_compatible(&from_ty, &to_ty) {
            return Err(GraphError::InvalidConnection(format!(
                "cannot connect {} to {}",
                from_ty.name(),
                to_ty.name()
            )));
        }

        let occupied: Vec<EdgeId> = graph
            .edges()
            .filter(|e| *e.to() == to.node && e.to_port() == to.port)
            .map(|e| e.id().clone())
            .collect();
        for edge_id in occupied {
            tracing::debug!(edge = %edge_id, "replacing connection into {}.{}", to.node, to.port);
            graph.remove_edge(&edge_id);
        }

        graph.add_edge(Edge::new(from.node, from.port, to.node, to.port))
    }

    /// Abandon the connection being drawn
    pub fn connector_cancel(&mut self) {
        if matches!(self.mode, InteractionMode::CreatingConnection(_)) {
            self.mode = InteractionMode::Normal;
        }
    }

    /// Remove an edge
    pub fn disconnect(&mut self, graph: &mut Graph, edge_id: &EdgeId) -> Result<Edge, GraphError> {
        graph
            .remove_edge(edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.clone()))
    }
}

fn port_type(
    graph: &Graph,
    node_id: &NodeId,
    port: &str,
    direction: PortDirection,
) -> Result<Arc<AttributeType>, GraphError> {
    let node = graph
        .node(node_id)
        .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
    let section = direction.section();
    node.core()
        .class()
        .schema()
        .section(section)
        .get(port)
        .cloned()
        .ok_or_else(|| GraphError::PortNotFound {
            node: node_id.clone(),
            port: port.to_string(),
            direction: section.label(),
        })
}

/// Whether an output of type `from` may feed an input of type `to`
pub fn types_compatible(from: &AttributeType, to: &AttributeType) -> bool {
    // Any type can connect to object
    if from.is_a(to) || from.name() == to.name() || to.name() == OBJECT_TYPE_NAME {
        return true;
    }
    matches!(
        (from.name(), to.name()),
        ("integer", "number") | ("number", "integer")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tests::{doubler_class, source_class};
    use crate::node::{Node, NodeOptions};
    use crate::types::TypeRegistry;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    fn graph() -> Graph {
        let types = TypeRegistry::with_builtins().unwrap();
        let doubler = doubler_class(&types, Arc::new(AtomicU32::new(0)));
        let mut graph = Graph::new("canvas");
        for (class, id, x) in [
            (source_class(&types), "a", 0.0),
            (source_class(&types), "z", 0.0),
            (Arc::clone(&doubler), "b", 200.0),
        ] {
            let node = Node::with_options(
                &class,
                NodeOptions {
                    id: Some(NodeId::from(id)),
                    ..Default::default()
                },
            );
            graph.add_node(node, [x, 0.0]);
        }
        graph
    }

    fn id(raw: &str) -> NodeId {
        NodeId::from(raw)
    }

    #[test]
    fn test_drag_with_snap() {
        let mut graph = graph();
        let mut canvas = CanvasController::new();
        canvas.snap_to_grid = true;

        canvas.on_node_start(&graph, &id("b")).unwrap();
        assert_eq!(canvas.on_node_move(&mut graph, [33.0, 47.0]), Some([40.0, 40.0]));
        let moved = canvas.on_node_stop(&graph).unwrap();
        assert_eq!(moved.from, [200.0, 0.0]);
        assert_eq!(moved.to, [40.0, 40.0]);
        assert_eq!(canvas.mode, InteractionMode::Normal);
        assert_eq!(canvas.on_node_move(&mut graph, [0.0, 0.0]), None);
    }

    #[test]
    fn test_stop_outside_a_drag_keeps_mode() {
        let mut graph = graph();
        let mut canvas = CanvasController::new();
        canvas
            .connector_start(&graph, &id("a"), "out", PortDirection::Output)
            .unwrap();
        assert_eq!(canvas.on_node_stop(&graph), None);
        assert!(matches!(canvas.mode, InteractionMode::CreatingConnection(_)));

        // a node removed mid-drag still ends the drag
        canvas.mode = InteractionMode::Normal;
        canvas.on_node_start(&graph, &id("b")).unwrap();
        graph.remove_node(&id("b"));
        assert_eq!(canvas.on_node_stop(&graph), None);
        assert_eq!(canvas.mode, InteractionMode::Normal);
    }

    #[test]
    fn test_connect_from_either_end() {
        let mut graph = graph();
        let mut canvas = CanvasController::new();

        canvas
            .connector_start(&graph, &id("b"), "in", PortDirection::Input)
            .unwrap();
        let edge = canvas.connector_complete(&mut graph, &id("a"), "out").unwrap();
        let edge = graph.edge(&edge).unwrap();
        assert_eq!(edge.from(), &id("a"));
        assert_eq!(edge.to(), &id("b"));
        assert_eq!(
            graph.node(&id("b")).unwrap().core().props().get("in"),
            Some(&json!(5))
        );
    }

    #[test]
    fn test_occupied_input_is_replaced() {
        let mut graph = graph();
        let mut canvas = CanvasController::new();
        canvas
            .connector_start(&graph, &id("a"), "out", PortDirection::Output)
            .unwrap();
        let first = canvas.connector_complete(&mut graph, &id("b"), "in").unwrap();

        canvas
            .connector_start(&graph, &id("z"), "out", PortDirection::Output)
            .unwrap();
        let second = canvas.connector_complete(&mut graph, &id("b"), "in").unwrap();

        assert!(graph.edge(&first).is_none());
        assert!(graph.edge(&second).is_some());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_invalid_requests() {
        let mut graph = graph();
        let mut canvas = CanvasController::new();

        assert!(matches!(
            canvas.connector_complete(&mut graph, &id("b"), "in"),
            Err(GraphError::InvalidConnection(_))
        ));

        assert!(matches!(
            canvas.connector_start(&graph, &id("a"), "missing", PortDirection::Output),
            Err(GraphError::PortNotFound { .. })
        ));

        canvas
            .connector_start(&graph, &id("b"), "doubled", PortDirection::Output)
            .unwrap();
        assert!(matches!(
            canvas.connector_complete(&mut graph, &id("b"), "in"),
            Err(GraphError::InvalidConnection(_))
        ));

        // two outputs cannot be joined
        canvas
            .connector_start(&graph, &id("a"), "out", PortDirection::Output)
            .unwrap();
        assert!(matches!(
            canvas.connector_complete(&mut graph, &id("z"), "out"),
            Err(GraphError::PortNotFound { .. })
        ));
        assert_eq!(graph.edge_count(), 0);

        canvas
            .connector_start(&graph, &id("a"), "out", PortDirection::Output)
            .unwrap();
        canvas.connector_cancel();
        assert_eq!(canvas.mode, InteractionMode::Normal);
    }

    #[test]
    fn test_type_compatibility() {
        let types = TypeRegistry::with_builtins().unwrap();
        let number = types.require("number").unwrap();
        let integer = types.require("integer").unwrap();
        let string = types.require("string").unwrap();
        let object = types.require("object").unwrap();
        let geometry = types.require("Geometry").unwrap();

        assert!(types_compatible(&number, &number.desc("with help")));
        assert!(types_compatible(&integer, &number));
        assert!(types_compatible(&geometry, &object));
        assert!(!types_compatible(&string, &number));
        assert!(!types_compatible(&object, &geometry));
    }

    #[test]
    fn test_disconnect() {
        let mut graph = graph();
        let mut canvas = CanvasController::new();
        let edge = graph.connect(&id("a"), "out", &id("b"), "in").unwrap();
        canvas.disconnect(&mut graph, &edge).unwrap();
        assert!(matches!(
            canvas.disconnect(&mut graph, &edge),
            Err(GraphError::EdgeNotFound(_))
        ));
    }
}

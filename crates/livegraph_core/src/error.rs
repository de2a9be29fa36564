// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types shared across the engine.

use crate::connection::EdgeId;
use crate::node::NodeId;

/// Startup configuration error (type or node-class registration).
///
/// These are raised while the catalogs are being built, before any graph
/// exists, and are not meant to be recovered from.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Type built without a name
    #[error("Attribute type has no name")]
    MissingName,

    /// Type built without a kind
    #[error("Attribute type '{0}' has no kind")]
    MissingKind(String),

    /// A type with this name is already registered
    #[error("Attribute type '{0}' is already registered")]
    DuplicateType(String),

    /// Primitive types cannot carry a schema
    #[error("Primitive type '{0}' must not have a schema")]
    PrimitiveWithSchema(String),

    /// Enum and complex types need a schema
    #[error("Type '{0}' requires a schema")]
    MissingSchema(String),

    /// Type lookup by name failed
    #[error("Unknown attribute type '{0}'")]
    UnknownType(String),

    /// A node class with this registry name already exists
    #[error("Node class '{0}' is already registered")]
    DuplicateNodeClass(String),

    /// A node schema field refers to a type that was never registered
    #[error("Node class '{class}' field '{field}' uses unregistered type '{type_name}'")]
    UnregisteredFieldType {
        /// Node class registry name
        class: String,
        /// Offending schema field
        field: String,
        /// Type name that failed to resolve
        type_name: String,
    },
}

/// A value was rejected by an attribute type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributeError {
    /// Raw value could not be parsed
    #[error("Cannot parse {type_name}: {reason}")]
    Parse {
        /// Type that rejected the value
        type_name: String,
        /// Human readable reason
        reason: String,
    },

    /// Value could not be serialized
    #[error("Cannot serialize {type_name}: {reason}")]
    Serialize {
        /// Type that rejected the value
        type_name: String,
        /// Human readable reason
        reason: String,
    },
}

impl AttributeError {
    /// Build a parse error
    pub fn parse(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Build a serialize error
    pub fn serialize(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Serialize {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure raised by a node's behavior
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeError {
    /// The node class never implemented `process`
    #[error("Node class '{0}' does not implement process")]
    NotImplemented(String),

    /// Node specific failure
    #[error("{0}")]
    Failed(String),
}

/// Error while loading a graph document.
///
/// A failed load never touches the graph that was active before it.
#[derive(Debug, thiserror::Error)]
pub enum GraphLoadError {
    /// Document is not valid JSON for the graph format
    #[error("Malformed graph document: {0}")]
    Json(#[from] serde_json::Error),

    /// Node record names a type missing from the registry
    #[error("Unknown node type '{0}'")]
    UnknownNodeType(String),

    /// Edge record points at a node id that was not loaded
    #[error("Edge {edge:?} references missing node {node:?}")]
    MissingEndpoint {
        /// Edge being loaded
        edge: EdgeId,
        /// Node id that could not be found
        node: NodeId,
    },
}

/// Error from a graph mutation
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Edge not found
    #[error("Edge not found: {0:?}")]
    EdgeNotFound(EdgeId),

    /// Port not declared in the node schema
    #[error("Node {node:?} has no {direction} port '{port}'")]
    PortNotFound {
        /// Node that was queried
        node: NodeId,
        /// Missing port key
        port: String,
        /// "input", "output" or "state"
        direction: &'static str,
    },

    /// Output values cannot be edited
    #[error("Attribute '{0}' is read-only")]
    ReadOnly(String),

    /// Connection rejected by the canvas rules
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    /// An inspector edit arrived while no node was bound
    #[error("No node is being inspected")]
    NotInspecting,

    /// Edited value rejected by its type
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

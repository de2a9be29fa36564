// SPDX-License-Identifier: MIT OR Apache-2.0
//! Live dataflow graph engine.
//!
//! A graph of typed nodes that re-evaluates incrementally: when a node's
//! props or state change, it recomputes its outputs, diffs them against its
//! output cache, and forwards only what changed along its edges.
//!
//! ## Architecture
//!
//! - [`types`]: registered attribute types with parse/serialize contracts
//! - [`connection`]: edges between an output port and an input port
//! - [`node`]: the node runtime, lifecycle hooks and output caching
//! - [`registry`]: node classes by registry name, used when loading documents
//! - [`graph`]: node and edge ownership, change propagation, persistence
//! - [`inspector`], [`view`], [`session`]: the surface editor front ends bind to
//!
//! Propagation is synchronous and unscheduled. A cyclic graph recurses
//! without bound.

pub mod config;
pub mod connection;
pub mod error;
pub mod graph;
pub mod inspector;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod schema;
pub mod serialization;
pub mod session;
pub mod types;
pub mod value;
pub mod view;

mod propagation;

pub use config::{ConfigFileError, EngineConfig};
pub use connection::{Connection, Edge, EdgeId, EdgeRecord};
pub use error::{AttributeError, ConfigError, GraphError, GraphLoadError, NodeError};
pub use graph::{Graph, GraphId, NodeInSpace, Position};
pub use inspector::{AttributePane, ChangeTarget, Changeable, ChangeableGroup};
pub use node::{AcceptsRenderPass, ListenerId, Node, NodeBehavior, NodeCore, NodeId, NodeOptions};
pub use registry::{Catalog, NodeRegistry};
pub use schema::{NodeCategory, NodeClass, NodeSchema, SchemaSection};
pub use serialization::{GraphRecord, NodeRecord};
pub use session::Session;
pub use types::{AttributeType, TypeBuilder, TypeId, TypeKind, TypeMetadata, TypeRegistry};
pub use value::{Attributes, Payload, Value};
pub use view::{CanvasController, PortDirection};

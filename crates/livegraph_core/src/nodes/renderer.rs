// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame output node that collects render passes from its connections.

use crate::connection::{Connection, EdgeId};
use crate::error::{ConfigError, NodeError};
use crate::node::{AcceptsRenderPass, NodeBehavior, NodeCore, NodeId};
use crate::schema::{NodeCategory, NodeClass, NodeSchema};
use crate::types::{TypeRegistry, OBJECT_TYPE_NAME};
use crate::value::{Payload, Value};
use serde_json::json;
use std::sync::Arc;

/// A connection registered as a render pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPass {
    /// Edge feeding the pass
    pub edge: EdgeId,
    /// Upstream node
    pub source: NodeId,
    /// Upstream port
    pub port: String,
}

/// Composes a frame description from its scene input and attached passes
#[derive(Debug, Default)]
pub struct Renderer {
    passes: Vec<RenderPass>,
}

impl Renderer {
    /// Passes in attach order
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }
}

impl AcceptsRenderPass for Renderer {
    fn attach_render_pass(&mut self, node: &mut NodeCore, edge: &Connection) {
        tracing::debug!(node = %node.id(), "adding render pass from {}.{}", edge.from, edge.from_port);
        self.passes.push(RenderPass {
            edge: edge.id.clone(),
            source: edge.from.clone(),
            port: edge.from_port.clone(),
        });
    }

    fn detach_render_pass(&mut self, node: &mut NodeCore, edge: &Connection) {
        tracing::debug!(node = %node.id(), "removing render pass {}", edge.id);
        self.passes.retain(|pass| pass.edge != edge.id);
    }
}

impl NodeBehavior for Renderer {
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        let passes: Vec<Value> = self
            .passes
            .iter()
            .map(|pass| json!(format!("{}.{}", pass.source, pass.port)))
            .collect();
        let frame = json!({
            "scene": node.props().get("scene").cloned().unwrap_or(Value::Null),
            "passes": passes,
        });
        Ok(Payload::from([("frame".to_string(), frame)]))
    }

    fn render_target(&mut self) -> Option<&mut dyn AcceptsRenderPass> {
        Some(self)
    }
}

/// Renderer with a `scene` input, a `pass` input and a `frame` output
pub fn renderer_class(types: &TypeRegistry) -> Result<NodeClass, ConfigError> {
    let geometry = types.require("Geometry")?;
    let any = types.require(OBJECT_TYPE_NAME)?;
    Ok(NodeClass::new("Renderer", || Box::<Renderer>::default())
        .with_category(NodeCategory::Output)
        .with_description("Compose the scene and its render passes into a frame")
        .with_schema(
            NodeSchema::new()
                .input("scene", geometry)
                .input("pass", Arc::clone(&any))
                .output("frame", any),
        ))
}

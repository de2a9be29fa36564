// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constant value nodes, one class per primitive type.

use crate::error::NodeError;
use crate::node::{NodeBehavior, NodeCore};
use crate::schema::{NodeCategory, NodeClass, NodeSchema};
use crate::types::AttributeType;
use crate::value::{Payload, Value};
use std::sync::Arc;

/// Port and state key used by every constant node
pub const VALUE_KEY: &str = "value";

/// Emits its `value` state field
#[derive(Debug, Default)]
pub struct Constant;

impl NodeBehavior for Constant {
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        let value = node.state().get(VALUE_KEY).cloned().unwrap_or(Value::Null);
        Ok(Payload::from([(VALUE_KEY.to_string(), value)]))
    }
}

/// Build a constant node class for a primitive type.
///
/// The class carries one `value` state field and one `value` output, both of
/// type `ty`. Each class is independent; nothing is shared between them
/// apart from the behavior.
pub fn primitive_class(registry_name: &str, ty: &Arc<AttributeType>) -> NodeClass {
    NodeClass::new(registry_name, || Box::new(Constant))
        .with_category(NodeCategory::Input)
        .with_description(format!("Constant {} value", ty.name()))
        .with_schema(
            NodeSchema::new()
                .state(VALUE_KEY, Arc::clone(ty))
                .output(VALUE_KEY, Arc::clone(ty)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::{Node, NodeId, NodeOptions};
    use crate::types::TypeRegistry;
    use crate::value::payload;
    use serde_json::json;

    #[test]
    fn test_constant_seeds_from_type_default() {
        let types = TypeRegistry::with_builtins().unwrap();
        let class = Arc::new(primitive_class("Boolean", &types.require("boolean").unwrap()));
        let mut node = Node::new(&class);
        assert_eq!(
            node.process(&[VALUE_KEY.to_string()]).unwrap(),
            payload([(VALUE_KEY, json!(false))])
        );
        assert_eq!(class.category(), NodeCategory::Input);
    }

    #[test]
    fn test_constant_edit_emits() {
        let types = TypeRegistry::with_builtins().unwrap();
        let class = Arc::new(primitive_class("String", &types.require("string").unwrap()));
        let mut graph = Graph::new("constants");
        let id = NodeId::from("s");
        graph.add_node(
            Node::with_options(
                &class,
                NodeOptions {
                    id: Some(id.clone()),
                    ..Default::default()
                },
            ),
            [0.0, 0.0],
        );
        assert!(graph.node(&id).unwrap().core().is_live());

        graph.set_state(&id, &payload([(VALUE_KEY, json!("hi"))])).unwrap();
        assert_eq!(
            graph.node(&id).unwrap().core().output_cache().get(VALUE_KEY),
            Some(&json!("hi"))
        );
    }
}

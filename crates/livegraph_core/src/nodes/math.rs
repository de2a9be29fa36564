// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arithmetic nodes over `number` values.

use crate::error::{ConfigError, NodeError};
use crate::node::{NodeBehavior, NodeCore};
use crate::schema::{NodeCategory, NodeClass, NodeSchema};
use crate::types::TypeRegistry;
use crate::value::{Attributes, Payload};
use serde_json::json;
use std::sync::Arc;

fn number(values: &Attributes, key: &str) -> Result<f64, NodeError> {
    match values.get(key) {
        None => Err(NodeError::Failed(format!("'{key}' has no value"))),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| NodeError::Failed(format!("'{key}' is not a number: {value}"))),
    }
}

/// Binary operation on inputs `a` and `b`, written to `out`
struct Binary(fn(f64, f64) -> f64);

impl NodeBehavior for Binary {
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        let a = number(node.props(), "a")?;
        let b = number(node.props(), "b")?;
        Ok(Payload::from([("out".to_string(), json!((self.0)(a, b)))]))
    }
}

fn binary_class(
    types: &TypeRegistry,
    name: &str,
    description: &str,
    identity: f64,
    op: fn(f64, f64) -> f64,
) -> Result<NodeClass, ConfigError> {
    let number = types.require("number")?;
    Ok(NodeClass::new(name, move || Box::new(Binary(op)))
        .with_category(NodeCategory::Math)
        .with_description(description)
        .with_schema(
            NodeSchema::new()
                .input("a", Arc::clone(&number))
                .input("b", Arc::clone(&number))
                .output("out", number),
        )
        .with_default_prop("a", json!(identity))
        .with_default_prop("b", json!(identity)))
}

/// `out = a + b`
pub fn add_class(types: &TypeRegistry) -> Result<NodeClass, ConfigError> {
    binary_class(types, "Add", "Add two numbers", 0.0, |a, b| a + b)
}

/// `out = a * b`
pub fn multiply_class(types: &TypeRegistry) -> Result<NodeClass, ConfigError> {
    binary_class(types, "Multiply", "Multiply two numbers", 1.0, |a, b| a * b)
}

struct Double;

impl NodeBehavior for Double {
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        let value = number(node.props(), "in")?;
        Ok(Payload::from([("out".to_string(), json!(value * 2.0))]))
    }
}

/// `out = in * 2`
pub fn double_class(types: &TypeRegistry) -> Result<NodeClass, ConfigError> {
    let number = types.require("number")?;
    Ok(NodeClass::new("Double", || Box::new(Double))
        .with_category(NodeCategory::Math)
        .with_description("Double a number")
        .with_schema(NodeSchema::new().input("in", Arc::clone(&number)).output("out", number))
        .with_default_prop("in", json!(0.0)))
}

/// Multiplies its input by a persisted `factor`
struct Scale;

impl NodeBehavior for Scale {
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        let value = number(node.props(), "in")?;
        let factor = number(node.state(), "factor")?;
        Ok(Payload::from([("out".to_string(), json!(value * factor))]))
    }
}

/// `out = in * state.factor`
pub fn scale_class(types: &TypeRegistry) -> Result<NodeClass, ConfigError> {
    let number = types.require("number")?;
    Ok(NodeClass::new("Scale", || Box::new(Scale))
        .with_category(NodeCategory::Math)
        .with_description("Multiply a number by a stored factor")
        .with_schema(
            NodeSchema::new()
                .input("in", Arc::clone(&number))
                .output("out", Arc::clone(&number))
                .state("factor", number.desc("Multiplier applied to the input")),
        )
        .with_default_prop("in", json!(0.0))
        .with_default_state("factor", json!(1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::{Node, NodeId, NodeOptions};
    use crate::nodes::primitive::primitive_class;
    use crate::value::payload;

    fn add(graph: &mut Graph, class: NodeClass, id: &str, state: Payload) -> NodeId {
        let node = Node::with_options(
            &Arc::new(class),
            NodeOptions {
                id: Some(NodeId::from(id)),
                state,
                ..Default::default()
            },
        );
        graph.add_node(node, [0.0, 0.0]).node.id().clone()
    }

    fn output(graph: &Graph, id: &NodeId) -> Option<serde_json::Value> {
        graph.node(id)?.core().output_cache().get("out").cloned()
    }

    #[test]
    fn test_add_and_multiply() {
        let types = TypeRegistry::with_builtins().unwrap();
        let number = types.require("number").unwrap();
        let mut graph = Graph::new("math");
        let x = add(&mut graph, primitive_class("Number", &number), "x", payload([("value", json!(3))]));
        let y = add(&mut graph, primitive_class("Number", &number), "y", payload([("value", json!(4))]));
        let sum = add(&mut graph, add_class(&types).unwrap(), "sum", Payload::new());
        let product = add(&mut graph, multiply_class(&types).unwrap(), "product", Payload::new());

        graph.connect(&x, "value", &sum, "a").unwrap();
        graph.connect(&y, "value", &sum, "b").unwrap();
        graph.connect(&sum, "out", &product, "a").unwrap();
        graph.connect(&y, "value", &product, "b").unwrap();
        assert_eq!(output(&graph, &sum), Some(json!(7.0)));
        assert_eq!(output(&graph, &product), Some(json!(28.0)));
        assert!(graph.node(&product).unwrap().core().is_live());

        graph.set_state(&x, &payload([("value", json!(1))])).unwrap();
        assert_eq!(output(&graph, &product), Some(json!(20.0)));
    }

    #[test]
    fn test_scale_uses_state() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut graph = Graph::new("scale");
        let s = add(&mut graph, scale_class(&types).unwrap(), "s", payload([("factor", json!(3.0))]));
        graph.set_props(&s, &payload([("in", json!(2.0))])).unwrap();
        assert_eq!(output(&graph, &s), Some(json!(6.0)));

        graph.set_state(&s, &payload([("factor", json!(0.5))])).unwrap();
        assert_eq!(output(&graph, &s), Some(json!(1.0)));

        let factor = &graph.node(&s).unwrap().core().class().schema().state["factor"];
        assert!(factor.has_extra_help());
    }

    #[test]
    fn test_non_numeric_input_fails_the_node() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut node = Node::with_options(
            &Arc::new(double_class(&types).unwrap()),
            NodeOptions {
                props: payload([("in", json!("two"))]),
                ..Default::default()
            },
        );
        let err = node.process(&["out".to_string()]).unwrap_err();
        assert!(matches!(err, NodeError::Failed(msg) if msg.contains("not a number")));
    }
}

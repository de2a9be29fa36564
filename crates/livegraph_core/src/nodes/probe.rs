// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sink that records whatever arrives on its input.

use crate::connection::Connection;
use crate::error::{ConfigError, NodeError};
use crate::node::{NodeBehavior, NodeCore};
use crate::schema::{NodeCategory, NodeClass, NodeSchema};
use crate::types::{TypeRegistry, OBJECT_TYPE_NAME};
use crate::value::{Payload, Value};
use serde_json::json;
use std::sync::Arc;

struct Probe;

impl NodeBehavior for Probe {
    fn on_input_change(&mut self, node: &mut NodeCore, edge: &Connection, change: &Payload) -> Vec<String> {
        if let Some(value) = change.get(&edge.to_port) {
            tracing::debug!(node = %node.id(), "probe received {}", value);
            let count = node.state().get("received").and_then(Value::as_u64).unwrap_or(0);
            node.set_state(&Payload::from([
                ("last".to_string(), value.clone()),
                ("received".to_string(), json!(count + 1)),
            ]));
        }
        Vec::new()
    }

    fn process(&mut self, _node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        Ok(Payload::new())
    }
}

/// Records the last value seen on `in` and how many values arrived
pub fn probe_class(types: &TypeRegistry) -> Result<NodeClass, ConfigError> {
    let any = types.require(OBJECT_TYPE_NAME)?;
    let integer = types.require("integer")?;
    Ok(NodeClass::new("Probe", || Box::new(Probe))
        .with_category(NodeCategory::Output)
        .with_description("Record incoming values for inspection")
        .with_schema(
            NodeSchema::new()
                .input("in", Arc::clone(&any))
                .state("last", any)
                .state("received", integer),
        ))
}

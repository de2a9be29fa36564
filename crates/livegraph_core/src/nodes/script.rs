// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes driven by user supplied logic.
//!
//! User code never fails the engine. A returned error or a panic is caught
//! and emitted on the node's outputs as `{result: null, error: {error,
//! context}}`.

use crate::error::{ConfigError, NodeError};
use crate::node::{NodeBehavior, NodeCore};
use crate::schema::{NodeCategory, NodeClass, NodeSchema};
use crate::types::{Fields, TypeRegistry, OBJECT_TYPE_NAME};
use crate::value::{Attributes, Payload, Value};
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// User logic: `(props, state) -> result`
pub type ScriptFn = Arc<dyn Fn(&Attributes, &Attributes) -> Result<Value, String> + Send + Sync>;

struct Script {
    run: ScriptFn,
}

impl Script {
    fn failure(node: &NodeCore, error: String) -> Payload {
        tracing::warn!(node = %node.id(), "script failed: {}", error);
        Payload::from([
            ("result".to_string(), Value::Null),
            (
                "error".to_string(),
                json!({
                    "error": error,
                    "context": {
                        "node": node.id().as_str(),
                        "type": node.class().registry_name(),
                        "props": node.props().as_payload(),
                    },
                }),
            ),
        ])
    }
}

impl NodeBehavior for Script {
    fn process(&mut self, node: &NodeCore, _keys: &[String]) -> Result<Payload, NodeError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.run)(node.props(), node.state())));
        Ok(match outcome {
            Ok(Ok(result)) => Payload::from([("result".to_string(), result), ("error".to_string(), Value::Null)]),
            Ok(Err(error)) => Self::failure(node, error),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "script panicked".to_string());
                Self::failure(node, message)
            }
        })
    }
}

/// Build a node class around user logic.
///
/// `inputs` and `state` declare the script's ports and persisted fields.
/// The class always has two `object` outputs, `result` and `error`.
pub fn scripted_class<F>(
    types: &TypeRegistry,
    registry_name: &str,
    inputs: Fields,
    state: Fields,
    run: F,
) -> Result<NodeClass, ConfigError>
where
    F: Fn(&Attributes, &Attributes) -> Result<Value, String> + Send + Sync + 'static,
{
    let any = types.require(OBJECT_TYPE_NAME)?;
    let run: ScriptFn = Arc::new(run);
    let schema = NodeSchema {
        input: inputs,
        output: Fields::from([
            ("result".to_string(), Arc::clone(&any)),
            ("error".to_string(), any),
        ]),
        state,
    };
    Ok(NodeClass::new(registry_name, move || {
        Box::new(Script {
            run: Arc::clone(&run),
        })
    })
    .with_category(NodeCategory::Custom)
    .with_description("User scripted node")
    .with_schema(schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeOptions};
    use crate::value::payload;

    fn class(types: &TypeRegistry) -> Arc<NodeClass> {
        let number = types.require("number").unwrap();
        let class = scripted_class(
            types,
            "Reciprocal",
            Fields::from([("x".to_string(), number)]),
            Fields::new(),
            |props, _state| {
                let x = props.get_f64("x").ok_or("x is missing")?;
                if x == 0.0 {
                    panic!("division by zero");
                }
                if x < 0.0 {
                    return Err(format!("{x} is negative"));
                }
                Ok(json!(1.0 / x))
            },
        )
        .unwrap();
        Arc::new(class)
    }

    fn run(class: &Arc<NodeClass>, x: serde_json::Value) -> Payload {
        let mut node = Node::with_options(
            class,
            NodeOptions {
                props: payload([("x", x)]),
                ..Default::default()
            },
        );
        let keys = node.core().out_keys();
        node.process(&keys).unwrap()
    }

    #[test]
    fn test_success() {
        let types = TypeRegistry::with_builtins().unwrap();
        let out = run(&class(&types), json!(4.0));
        assert_eq!(out["result"], json!(0.25));
        assert_eq!(out["error"], Value::Null);
    }

    #[test]
    fn test_error_is_surfaced() {
        let types = TypeRegistry::with_builtins().unwrap();
        let out = run(&class(&types), json!(-1.0));
        assert_eq!(out["result"], Value::Null);
        assert_eq!(out["error"]["error"], json!("-1 is negative"));
        assert_eq!(out["error"]["context"]["type"], json!("Reciprocal"));
    }

    #[test]
    fn test_panic_is_caught() {
        let types = TypeRegistry::with_builtins().unwrap();
        let out = run(&class(&types), json!(0.0));
        assert_eq!(out["error"]["error"], json!("division by zero"));
    }
}

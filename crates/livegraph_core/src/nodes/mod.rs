// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node classes.

pub mod math;
pub mod primitive;
pub mod probe;
pub mod renderer;
pub mod script;

use crate::error::ConfigError;
use crate::registry::NodeRegistry;
use crate::types::TypeRegistry;

pub use script::{scripted_class, ScriptFn};

/// Register every built-in node class
pub fn register_builtin_nodes(registry: &mut NodeRegistry, types: &TypeRegistry) -> Result<(), ConfigError> {
    // ========================================================================
    // Input Nodes - Constants
    // ========================================================================

    for (type_name, registry_name) in [
        ("number", "Number"),
        ("integer", "Integer"),
        ("boolean", "Boolean"),
        ("string", "String"),
    ] {
        let ty = types.require(type_name)?;
        registry.register(primitive::primitive_class(registry_name, &ty), types)?;
    }

    // ========================================================================
    // Math Nodes
    // ========================================================================

    registry.register(math::add_class(types)?, types)?;
    registry.register(math::multiply_class(types)?, types)?;
    registry.register(math::double_class(types)?, types)?;
    registry.register(math::scale_class(types)?, types)?;

    // ========================================================================
    // Output Nodes
    // ========================================================================

    registry.register(probe::probe_class(types)?, types)?;
    registry.register(renderer::renderer_class(types)?, types)?;

    tracing::debug!("Registered {} built-in node classes", registry.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeCategory;

    #[test]
    fn test_builtins_register() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut registry = NodeRegistry::new();
        register_builtin_nodes(&mut registry, &types).unwrap();

        for name in ["Number", "Integer", "Boolean", "String", "Add", "Multiply", "Double", "Scale", "Probe", "Renderer"] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert_eq!(registry.classes_in_category(NodeCategory::Input).count(), 4);

        // a second pass collides with the first
        assert!(register_builtin_nodes(&mut registry, &types).is_err());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node class catalogue.
//!
//! Maps a stable registry name to a constructible [`NodeClass`]. Graph
//! documents refer to node types only by that name.

use crate::error::{ConfigError, GraphLoadError};
use crate::node::{Node, NodeOptions};
use crate::nodes;
use crate::schema::{NodeCategory, NodeClass};
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use std::sync::Arc;

/// Registry of available node classes
#[derive(Debug, Default)]
pub struct NodeRegistry {
    classes: IndexMap<String, Arc<NodeClass>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node class.
    ///
    /// Fails if the name is taken or if a schema field uses a type that
    /// `types` does not know.
    pub fn register(&mut self, class: NodeClass, types: &TypeRegistry) -> Result<Arc<NodeClass>, ConfigError> {
        let name = class.registry_name().to_string();
        if self.classes.contains_key(&name) {
            return Err(ConfigError::DuplicateNodeClass(name));
        }
        for (_, field, ty) in class.schema().fields() {
            if !types.contains(ty.name()) {
                return Err(ConfigError::UnregisteredFieldType {
                    class: name,
                    field: field.clone(),
                    type_name: ty.name().to_string(),
                });
            }
        }
        let class = Arc::new(class);
        self.classes.insert(name, Arc::clone(&class));
        Ok(class)
    }

    /// Get a node class by registry name
    pub fn get(&self, name: &str) -> Option<&Arc<NodeClass>> {
        self.classes.get(name)
    }

    /// Get all registered classes
    pub fn classes(&self) -> impl Iterator<Item = &Arc<NodeClass>> {
        self.classes.values()
    }

    /// Get classes by category
    pub fn classes_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &Arc<NodeClass>> {
        self.classes.values().filter(move |c| c.category() == category)
    }

    /// Case-insensitive search over names and descriptions
    pub fn search(&self, query: &str) -> Vec<Arc<NodeClass>> {
        let query = query.trim().to_lowercase();
        self.classes
            .values()
            .filter(|class| {
                query.is_empty()
                    || class.display_name().to_lowercase().contains(&query)
                    || class.registry_name().to_lowercase().contains(&query)
                    || class.description().to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Create a node by registry name
    pub fn create_node(&self, name: &str, options: NodeOptions) -> Result<Node, GraphLoadError> {
        let class = self.get(name).ok_or_else(|| {
            tracing::error!("Cannot create node: unknown type '{}'", name);
            GraphLoadError::UnknownNodeType(name.to_string())
        })?;
        Ok(Node::with_options(class, options))
    }
}

/// Type and node-class registries, built once during startup and shared
#[derive(Debug)]
pub struct Catalog {
    /// Attribute types
    pub types: TypeRegistry,
    /// Node classes
    pub nodes: NodeRegistry,
}

impl Catalog {
    /// Bundle existing registries
    pub fn new(types: TypeRegistry, nodes: NodeRegistry) -> Self {
        Self { types, nodes }
    }

    /// Register every built-in type and node class
    pub fn with_builtins() -> Result<Self, ConfigError> {
        let types = TypeRegistry::with_builtins()?;
        let mut node_registry = NodeRegistry::new();
        nodes::register_builtin_nodes(&mut node_registry, &types)?;
        tracing::debug!(
            types = types.len(),
            nodes = node_registry.len(),
            "catalog initialised"
        );
        Ok(Self::new(types, node_registry))
    }

    /// Register an additional node class
    pub fn register_node(&mut self, class: NodeClass) -> Result<Arc<NodeClass>, ConfigError> {
        self.nodes.register(class, &self.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeSchema;
    use crate::types::{TypeBuilder, TypeKind};

    struct Blank;
    impl crate::node::NodeBehavior for Blank {}

    #[test]
    fn test_duplicate_class_is_rejected() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut registry = NodeRegistry::new();
        registry.register(NodeClass::new("Blank", || Box::new(Blank)), &types).unwrap();
        let err = registry
            .register(NodeClass::new("Blank", || Box::new(Blank)), &types)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNodeClass(name) if name == "Blank"));
    }

    #[test]
    fn test_unregistered_field_type_is_rejected() {
        let types = TypeRegistry::with_builtins().unwrap();
        let mut elsewhere = TypeRegistry::new();
        let stray = TypeBuilder::new()
            .name("Stray")
            .kind(TypeKind::Primitive)
            .build(&mut elsewhere)
            .unwrap();

        let mut registry = NodeRegistry::new();
        let class = NodeClass::new("Uses", || Box::new(Blank))
            .with_schema(NodeSchema::new().state("oops", stray));
        let err = registry.register(class, &types).unwrap_err();
        assert!(matches!(err, ConfigError::UnregisteredFieldType { field, .. } if field == "oops"));
    }

    #[test]
    fn test_unknown_type_fails_creation() {
        let registry = NodeRegistry::new();
        let err = registry.create_node("Missing", NodeOptions::default()).unwrap_err();
        assert!(matches!(err, GraphLoadError::UnknownNodeType(name) if name == "Missing"));
    }

    #[test]
    fn test_builtin_catalog_search() {
        let catalog = Catalog::with_builtins().unwrap();
        let found = catalog.nodes.search("doub");
        assert!(found.iter().any(|c| c.registry_name() == "Double"));
        assert_eq!(catalog.nodes.search("").len(), catalog.nodes.len());
        assert!(catalog.nodes.classes_in_category(NodeCategory::Math).count() >= 3);
    }
}

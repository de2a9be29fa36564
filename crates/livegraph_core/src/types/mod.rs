// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute types: the closed set of named, validated value types used by
//! every port and state field.
//!
//! Types are created through [`TypeBuilder`] and registered by name in a
//! [`TypeRegistry`]. Identity is by [`TypeId`], so two types with the same
//! shape but different derivation never compare equal under
//! [`AttributeType::is_a`].

mod builder;
pub mod builtin;

pub use builder::TypeBuilder;

use crate::error::{AttributeError, ConfigError};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the schema-less catch-all type
pub const OBJECT_TYPE_NAME: &str = "object";

/// Unique identity of one type derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub Uuid);

impl TypeId {
    /// Create a new random type ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Broad classification of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Scalar value (number, string, ...)
    Primitive,
    /// One of a fixed set of options, listed in the schema
    Enum,
    /// Structured value with named fields
    Complex,
}

/// Extra per-type flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    /// Whether a value must be supplied
    pub required: bool,
}

/// Field name to type mapping
pub type Fields = IndexMap<String, Arc<AttributeType>>;

/// Converts a raw (document or editor) value into a checked value
pub type ParseFn = Arc<dyn Fn(&AttributeType, &Value) -> Result<Value, AttributeError> + Send + Sync>;

/// Converts a value into its persisted form; `Ok(None)` means "do not persist"
pub type SerializeFn =
    Arc<dyn Fn(&AttributeType, &Value) -> Result<Option<Value>, AttributeError> + Send + Sync>;

/// A registered, named value type
#[derive(Clone)]
pub struct AttributeType {
    pub(crate) id: TypeId,
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) schema: Option<Fields>,
    pub(crate) default_value: Value,
    pub(crate) parse: ParseFn,
    pub(crate) serialize: Option<SerializeFn>,
    pub(crate) metadata: TypeMetadata,
    pub(crate) description: Option<String>,
    pub(crate) type_description: Option<String>,
    pub(crate) opaque: bool,
}

impl AttributeType {
    /// Type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind tag
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Field or option schema, if any
    pub fn schema(&self) -> Option<&Fields> {
        self.schema.as_ref()
    }

    /// Value used when nothing else is supplied
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Metadata flags
    pub fn metadata(&self) -> &TypeMetadata {
        &self.metadata
    }

    /// Attribute specific help text
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Persistent documentation of the type itself
    pub fn type_description(&self) -> Option<&str> {
        self.type_description.as_deref()
    }

    /// Whether the attribute description adds anything beyond the type docs
    pub fn has_extra_help(&self) -> bool {
        match (&self.description, &self.type_description) {
            (Some(desc), Some(type_desc)) => desc != type_desc,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Identity comparison
    pub fn is_a(&self, other: &AttributeType) -> bool {
        self.id == other.id
    }

    /// Whether this is a scalar type
    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    /// Whether this is a structured type
    pub fn is_complex(&self) -> bool {
        self.kind == TypeKind::Complex
    }

    /// Whether this is an enumeration
    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Whether this type accepts any value without a schema (`object` and its aliases)
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Whether values of this type can be persisted
    pub fn has_serializer(&self) -> bool {
        self.serialize.is_some()
    }

    /// Parse a raw value
    pub fn parse(&self, raw: &Value) -> Result<Value, AttributeError> {
        (self.parse)(self, raw)
    }

    /// Serialize a value; `Ok(None)` when the type does not persist it
    pub fn serialize(&self, value: &Value) -> Result<Option<Value>, AttributeError> {
        match &self.serialize {
            Some(serialize) => serialize(self, value),
            None => Ok(None),
        }
    }

    /// Start a new type under a different name, copying everything else.
    ///
    /// The result must be built into a registry like any other type.
    pub fn aliased(&self, name: impl Into<String>, type_description: Option<&str>) -> TypeBuilder {
        let mut builder = TypeBuilder::from_type(self).name(name);
        if let Some(text) = type_description {
            builder = builder.type_description(text);
        }
        builder
    }

    /// Copy with a different attribute description and a new identity
    pub fn desc(&self, description: impl Into<String>) -> Arc<AttributeType> {
        let mut derived = self.clone();
        derived.id = TypeId::new();
        derived.description = Some(description.into());
        Arc::new(derived)
    }

    /// Copy with different metadata and a new identity
    pub fn meta(&self, metadata: TypeMetadata) -> Arc<AttributeType> {
        let mut derived = self.clone();
        derived.id = TypeId::new();
        derived.metadata = metadata;
        Arc::new(derived)
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("fields", &self.schema.as_ref().map(|s| s.keys().collect::<Vec<_>>()))
            .field("serializable", &self.serialize.is_some())
            .finish()
    }
}

/// Registry of attribute types by name.
///
/// Populated during an explicit init phase and never cleared afterwards.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, Arc<AttributeType>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in type
    pub fn with_builtins() -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        builtin::register_builtin_types(&mut registry)?;
        Ok(registry)
    }

    pub(crate) fn insert(&mut self, ty: AttributeType) -> Result<Arc<AttributeType>, ConfigError> {
        if self.types.contains_key(&ty.name) {
            return Err(ConfigError::DuplicateType(ty.name));
        }
        let ty = Arc::new(ty);
        self.types.insert(ty.name.clone(), Arc::clone(&ty));
        Ok(ty)
    }

    /// Get a type by name
    pub fn get(&self, name: &str) -> Option<&Arc<AttributeType>> {
        self.types.get(name)
    }

    /// Get a type by name, failing with a configuration error
    pub fn require(&self, name: &str) -> Result<Arc<AttributeType>, ConfigError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownType(name.to_string()))
    }

    /// Whether a type with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Iterate over all registered types
    pub fn iter(&self) -> impl Iterator<Item = &Arc<AttributeType>> {
        self.types.values()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = TypeRegistry::new();
        TypeBuilder::new()
            .name("thing")
            .kind(TypeKind::Primitive)
            .build(&mut registry)
            .unwrap();
        let err = TypeBuilder::new()
            .name("thing")
            .kind(TypeKind::Primitive)
            .build(&mut registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateType(name) if name == "thing"));
    }

    #[test]
    fn test_derivations_get_new_identity() {
        let registry = TypeRegistry::with_builtins().unwrap();
        let number = registry.require("number").unwrap();
        let documented = number.desc("Oscillator frequency in Hz");

        assert!(!documented.is_a(&number));
        assert!(number.is_a(&number));
        assert_eq!(documented.name(), "number");
        assert!(documented.has_extra_help());
        assert!(!number.has_extra_help());

        let required = number.meta(TypeMetadata { required: true });
        assert!(required.metadata().required);
        assert!(!required.is_a(&number));
    }

    #[test]
    fn test_alias_registers_new_name() {
        let mut registry = TypeRegistry::with_builtins().unwrap();
        let object = registry.require(OBJECT_TYPE_NAME).unwrap();
        let mesh = object
            .aliased("Mesh", Some("Triangle mesh"))
            .build(&mut registry)
            .unwrap();

        assert_eq!(mesh.type_description(), Some("Triangle mesh"));
        assert!(mesh.is_opaque());
        assert!(!mesh.is_a(&object));
        assert!(registry.contains("Mesh"));
        assert_eq!(mesh.parse(&json!({"v": [1, 2]})).unwrap(), json!({"v": [1, 2]}));
    }

    #[test]
    fn test_classification_follows_kind() {
        let registry = TypeRegistry::with_builtins().unwrap();
        assert!(registry.require("number").unwrap().is_primitive());
        assert!(registry.require("Vector3").unwrap().is_complex());
        assert!(registry.require("BlendMode").unwrap().is_enum());
    }
}

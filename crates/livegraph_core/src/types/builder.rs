// SPDX-License-Identifier: MIT OR Apache-2.0
//! Builder for attribute types.

use super::{
    AttributeType, Fields, ParseFn, SerializeFn, TypeId, TypeKind, TypeMetadata, TypeRegistry,
    OBJECT_TYPE_NAME,
};
use crate::error::{AttributeError, ConfigError};
use crate::value::Value;
use std::sync::Arc;

/// Incrementally describes a type, then validates and registers it
#[derive(Clone, Default)]
pub struct TypeBuilder {
    name: Option<String>,
    kind: Option<TypeKind>,
    schema: Option<Fields>,
    default_value: Option<Value>,
    parse: Option<ParseFn>,
    serialize: Option<SerializeFn>,
    metadata: TypeMetadata,
    description: Option<String>,
    type_description: Option<String>,
    opaque: bool,
}

impl TypeBuilder {
    /// Start an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of an existing type
    pub fn from_type(ty: &AttributeType) -> Self {
        Self {
            name: Some(ty.name.clone()),
            kind: Some(ty.kind),
            schema: ty.schema.clone(),
            default_value: Some(ty.default_value.clone()),
            parse: Some(Arc::clone(&ty.parse)),
            serialize: ty.serialize.clone(),
            metadata: ty.metadata.clone(),
            description: ty.description.clone(),
            type_description: ty.type_description.clone(),
            opaque: ty.opaque,
        }
    }

    /// Set the name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the kind
    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the field (complex) or option (enum) schema
    pub fn schema(mut self, schema: Fields) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Add one schema entry
    pub fn field(mut self, name: impl Into<String>, ty: Arc<AttributeType>) -> Self {
        self.schema.get_or_insert_with(Fields::new).insert(name.into(), ty);
        self
    }

    /// Set the default value
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the parser
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&AttributeType, &Value) -> Result<Value, AttributeError> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(parse));
        self
    }

    /// Set the serializer
    pub fn serialize<F>(mut self, serialize: F) -> Self
    where
        F: Fn(&AttributeType, &Value) -> Result<Option<Value>, AttributeError>
            + Send
            + Sync
            + 'static,
    {
        self.serialize = Some(Arc::new(serialize));
        self
    }

    /// Persist values as they are
    pub fn serialize_as_is(self) -> Self {
        self.serialize(|_, value| Ok(Some(value.clone())))
    }

    /// Mark values as required
    pub fn required(mut self, required: bool) -> Self {
        self.metadata.required = required;
        self
    }

    /// Set the attribute help text
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the type documentation
    pub fn type_description(mut self, text: impl Into<String>) -> Self {
        self.type_description = Some(text.into());
        self
    }

    /// Validate and register the type.
    ///
    /// Every successful build produces a new identity.
    pub fn build(self, registry: &mut TypeRegistry) -> Result<Arc<AttributeType>, ConfigError> {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ConfigError::MissingName),
        };
        if registry.contains(&name) {
            return Err(ConfigError::DuplicateType(name));
        }
        let Some(kind) = self.kind else {
            return Err(ConfigError::MissingKind(name));
        };
        let opaque = self.opaque || name == OBJECT_TYPE_NAME;
        match (kind, &self.schema) {
            (TypeKind::Primitive, Some(_)) => return Err(ConfigError::PrimitiveWithSchema(name)),
            (TypeKind::Enum | TypeKind::Complex, None) if !opaque => {
                return Err(ConfigError::MissingSchema(name))
            }
            _ => {}
        }

        let default_value = match self.default_value {
            Some(value) => value,
            None => derived_default(kind, self.schema.as_ref()),
        };
        let parse = self.parse.unwrap_or_else(|| default_parser(kind));

        registry.insert(AttributeType {
            id: TypeId::new(),
            name,
            kind,
            schema: self.schema,
            default_value,
            parse,
            serialize: self.serialize,
            metadata: self.metadata,
            description: self.description,
            type_description: self.type_description,
            opaque,
        })
    }
}

fn derived_default(kind: TypeKind, schema: Option<&Fields>) -> Value {
    match (kind, schema) {
        (TypeKind::Complex, Some(fields)) => Value::Object(
            fields
                .iter()
                .map(|(key, ty)| (key.clone(), ty.default_value.clone()))
                .collect(),
        ),
        (TypeKind::Enum, Some(options)) => options
            .keys()
            .next()
            .map_or(Value::Null, |first| Value::String(first.clone())),
        _ => Value::Null,
    }
}

fn default_parser(kind: TypeKind) -> ParseFn {
    match kind {
        TypeKind::Complex => Arc::new(parse_fields),
        TypeKind::Enum => Arc::new(parse_option),
        TypeKind::Primitive => Arc::new(parse_as_is),
    }
}

fn parse_as_is(_ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    Ok(raw.clone())
}

/// Parse each schema field of an object, defaulting missing ones
pub(crate) fn parse_fields(ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    let Some(fields) = ty.schema() else {
        return Ok(raw.clone());
    };
    let Value::Object(map) = raw else {
        return Err(AttributeError::parse(&ty.name, "expected an object"));
    };
    let mut parsed = serde_json::Map::new();
    for (key, field_ty) in fields {
        let value = match map.get(key) {
            Some(raw_field) => field_ty.parse(raw_field)?,
            None => field_ty.default_value.clone(),
        };
        parsed.insert(key.clone(), value);
    }
    Ok(Value::Object(parsed))
}

/// Accept only one of the schema's option names
pub(crate) fn parse_option(ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    let options = ty.schema().map(|s| s.keys().cloned().collect::<Vec<_>>()).unwrap_or_default();
    match raw.as_str() {
        Some(choice) if options.iter().any(|o| o == choice) => Ok(raw.clone()),
        _ => Err(AttributeError::parse(
            &ty.name,
            format!("expected one of {}", options.join(", ")),
        )),
    }
}

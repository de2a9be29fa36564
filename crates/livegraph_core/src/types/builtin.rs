// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in attribute types.
//!
//! Primitives use lowercase names, structured types use `PascalCase`.

use super::{AttributeType, TypeBuilder, TypeKind, TypeRegistry, OBJECT_TYPE_NAME};
use crate::error::{AttributeError, ConfigError};
use crate::value::Value;
use serde_json::json;
use std::sync::Arc;

/// Register every built-in type into `registry`
pub fn register_builtin_types(registry: &mut TypeRegistry) -> Result<(), ConfigError> {
    // ========================================================================
    // Primitives
    // ========================================================================

    let number = TypeBuilder::new()
        .name("number")
        .kind(TypeKind::Primitive)
        .default_value(json!(0.0))
        .parse(parse_number)
        .serialize_as_is()
        .type_description("A floating point number")
        .build(registry)?;

    TypeBuilder::new()
        .name("integer")
        .kind(TypeKind::Primitive)
        .default_value(json!(0))
        .parse(parse_integer)
        .serialize_as_is()
        .type_description("A whole number")
        .build(registry)?;

    TypeBuilder::new()
        .name("boolean")
        .kind(TypeKind::Primitive)
        .default_value(json!(false))
        .parse(parse_boolean)
        .serialize_as_is()
        .type_description("True or false")
        .build(registry)?;

    let string = TypeBuilder::new()
        .name("string")
        .kind(TypeKind::Primitive)
        .default_value(json!(""))
        .parse(parse_string)
        .serialize_as_is()
        .type_description("A piece of text")
        .build(registry)?;

    // ========================================================================
    // Opaque runtime objects (never persisted)
    // ========================================================================

    let object = TypeBuilder::new()
        .name(OBJECT_TYPE_NAME)
        .kind(TypeKind::Complex)
        .type_description("Any value")
        .build(registry)?;

    for (name, doc) in [
        ("Geometry", "Mesh geometry produced at runtime"),
        ("Material", "Surface material"),
        ("Texture", "Image data sampled by materials"),
        ("Audio", "Audio buffer or stream handle"),
    ] {
        object.aliased(name, Some(doc)).build(registry)?;
    }

    // ========================================================================
    // Structured values
    // ========================================================================

    TypeBuilder::new()
        .name("Vector2")
        .kind(TypeKind::Complex)
        .field("x", Arc::clone(&number))
        .field("y", Arc::clone(&number))
        .serialize(serialize_fields)
        .type_description("Two component vector")
        .build(registry)?;

    TypeBuilder::new()
        .name("Vector3")
        .kind(TypeKind::Complex)
        .field("x", Arc::clone(&number))
        .field("y", Arc::clone(&number))
        .field("z", Arc::clone(&number))
        .serialize(serialize_fields)
        .type_description("Three component vector")
        .build(registry)?;

    let unit = number.desc("Channel intensity between 0 and 1");
    TypeBuilder::new()
        .name("Color")
        .kind(TypeKind::Complex)
        .field("r", Arc::clone(&unit))
        .field("g", Arc::clone(&unit))
        .field("b", Arc::clone(&unit))
        .field("a", unit)
        .default_value(json!({"r": 1.0, "g": 1.0, "b": 1.0, "a": 1.0}))
        .serialize(serialize_fields)
        .type_description("RGBA color")
        .build(registry)?;

    // ========================================================================
    // Enumerations
    // ========================================================================

    TypeBuilder::new()
        .name("BlendMode")
        .kind(TypeKind::Enum)
        .field("normal", Arc::clone(&string))
        .field("add", Arc::clone(&string))
        .field("multiply", Arc::clone(&string))
        .field("screen", string)
        .serialize_as_is()
        .type_description("How a layer combines with the one below")
        .build(registry)?;

    Ok(())
}

fn parse_number(ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    match raw {
        Value::Number(_) => Ok(raw.clone()),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(|n| json!(n))
            .map_err(|e| AttributeError::parse(ty.name(), e.to_string())),
        other => Err(AttributeError::parse(ty.name(), format!("expected a number, got {other}"))),
    }
}

fn parse_integer(ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    match raw {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(raw.clone()),
        Value::Number(n) => n
            .as_f64()
            .map(|f| json!(f.trunc() as i64))
            .ok_or_else(|| AttributeError::parse(ty.name(), "not representable")),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(|n| json!(n))
            .map_err(|e| AttributeError::parse(ty.name(), e.to_string())),
        other => Err(AttributeError::parse(ty.name(), format!("expected an integer, got {other}"))),
    }
}

fn parse_boolean(ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    match raw {
        Value::Bool(_) => Ok(raw.clone()),
        Value::String(text) => match text.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(AttributeError::parse(ty.name(), format!("expected true or false, got '{text}'"))),
        },
        other => Err(AttributeError::parse(ty.name(), format!("expected a boolean, got {other}"))),
    }
}

fn parse_string(ty: &AttributeType, raw: &Value) -> Result<Value, AttributeError> {
    match raw {
        Value::String(_) => Ok(raw.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(AttributeError::parse(ty.name(), format!("expected text, got {other}"))),
    }
}

/// Serialize an object field by field; fields whose type does not persist are dropped
fn serialize_fields(ty: &AttributeType, value: &Value) -> Result<Option<Value>, AttributeError> {
    let (Some(fields), Value::Object(map)) = (ty.schema(), value) else {
        return Err(AttributeError::serialize(ty.name(), "expected an object"));
    };
    let mut out = serde_json::Map::new();
    for (key, field_ty) in fields {
        if let Some(field_value) = map.get(key) {
            if let Some(raw) = field_ty.serialize(field_value)? {
                out.insert(key.clone(), raw);
            }
        }
    }
    Ok(Some(Value::Object(out)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins().unwrap()
    }

    #[test]
    fn test_primitive_parsers() {
        let types = registry();
        let number = types.require("number").unwrap();
        assert_eq!(number.parse(&json!("2.5")).unwrap(), json!(2.5));
        assert!(number.parse(&json!(true)).is_err());

        let integer = types.require("integer").unwrap();
        assert_eq!(integer.parse(&json!(3.9)).unwrap(), json!(3));

        let boolean = types.require("boolean").unwrap();
        assert_eq!(boolean.parse(&json!("true")).unwrap(), json!(true));

        let string = types.require("string").unwrap();
        assert_eq!(string.parse(&json!(4)).unwrap(), json!("4"));
    }

    #[test]
    fn test_object_types_are_not_persisted() {
        let types = registry();
        for name in ["object", "Geometry", "Material"] {
            let ty = types.require(name).unwrap();
            assert!(!ty.has_serializer(), "{name} should not persist");
            assert_eq!(ty.serialize(&json!({"a": 1})).unwrap(), None);
        }
    }

    #[test]
    fn test_enum_options() {
        let types = registry();
        let blend = types.require("BlendMode").unwrap();
        assert_eq!(blend.default_value(), &json!("normal"));
        assert!(blend.parse(&json!("screen")).is_ok());
        assert!(blend.parse(&json!("overlay")).is_err());
    }

    #[test]
    fn test_color_round_trip() {
        let types = registry();
        let color = types.require("Color").unwrap();
        let parsed = color.parse(&json!({"r": 0.5})).unwrap();
        assert_eq!(parsed, json!({"r": 0.5, "g": 0.0, "b": 0.0, "a": 0.0}));
        assert_eq!(color.serialize(&parsed).unwrap(), Some(parsed));
    }
}

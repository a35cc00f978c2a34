use ffire_wire::ByteBufferMut;
use log::debug;
use serde_json::Value;

use crate::{
    error::{Conformance, FfireError},
    types::{Primitive, Schema, Type, TypeKind},
    utils::{field_path, index_path},
    validator::integer_value,
};

/// Encodes a JSON value as the wire bytes of message `message`. Fields are
/// written in the schema's field order, so pass a canonicalized schema. Absent
/// and `null` optional values are encoded as not present.
pub fn convert(schema: &Schema, message: &str, value: &Value) -> Result<Vec<u8>, FfireError> {
    let message = schema.message(message)?;
    let mut bb = ByteBufferMut::new();
    write_value(schema, &message.type_, Some(value), "", &mut bb)?;
    debug!("encoded {} fixture: {} bytes", message.name, bb.len());
    Ok(bb.data())
}

/// Like [`convert`], parsing the JSON text first.
pub fn convert_json_str(schema: &Schema, message: &str, text: &str) -> Result<Vec<u8>, FfireError> {
    let value: Value = serde_json::from_str(text)?;
    convert(schema, message, &value)
}

fn write_value(
    schema: &Schema,
    type_: &Type,
    value: Option<&Value>,
    path: &str,
    bb: &mut ByteBufferMut,
) -> Result<(), FfireError> {
    let value = value.filter(|value| !value.is_null());

    if type_.optional {
        bb.write_presence(value.is_some());
        return match value {
            Some(value) => write_required(schema, type_, value, path, bb),
            None => Ok(()),
        };
    }

    match value {
        Some(value) => write_required(schema, type_, value, path, bb),
        None => Err(FfireError::data(path, Conformance::RequiredField)),
    }
}

fn write_required(
    schema: &Schema,
    type_: &Type,
    value: &Value,
    path: &str,
    bb: &mut ByteBufferMut,
) -> Result<(), FfireError> {
    match &type_.kind {
        TypeKind::Primitive(primitive) => write_primitive(*primitive, value, path, bb),
        TypeKind::Struct(id) => {
            let object = value
                .as_object()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("object")))?;
            for field in &schema.struct_def(*id).fields {
                let key = field.json_name();
                write_value(schema, &field.type_, object.get(key), &field_path(path, key), bb)?;
            }
            Ok(())
        }
        TypeKind::Array(element) => {
            let items = value
                .as_array()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("array")))?;
            bb.write_array_len(items.len())
                .map_err(|err| FfireError::from(err).at_path(path))?;
            for (index, item) in items.iter().enumerate() {
                write_value(schema, element, Some(item), &index_path(path, index), bb)?;
            }
            Ok(())
        }
    }
}

fn write_primitive(
    primitive: Primitive,
    value: &Value,
    path: &str,
    bb: &mut ByteBufferMut,
) -> Result<(), FfireError> {
    let number = || {
        value
            .as_f64()
            .ok_or_else(|| FfireError::data(path, Conformance::Expected("number")))
    };

    match primitive {
        Primitive::Bool => bb.write_bool(
            value
                .as_bool()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("boolean")))?,
        ),
        Primitive::Int8 => bb.write_i8(integer_value(primitive, value, path)? as i8),
        Primitive::Int16 => bb.write_i16(integer_value(primitive, value, path)? as i16),
        Primitive::Int32 => bb.write_i32(integer_value(primitive, value, path)? as i32),
        Primitive::Int64 => bb.write_i64(integer_value(primitive, value, path)?),
        Primitive::Float32 => bb.write_f32(number()? as f32),
        Primitive::Float64 => bb.write_f64(number()?),
        Primitive::String => {
            let text = value
                .as_str()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("string")))?;
            bb.write_string(text)
                .map_err(|err| FfireError::from(err).at_path(path))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{canonical::canonicalize, parser::parse_schema, tokenizer::tokenize_schema};
    use serde_json::json;

    fn schema(text: &str) -> Schema {
        let mut schema = parse_schema(&tokenize_schema(text).unwrap()).unwrap();
        canonicalize(&mut schema);
        schema
    }

    #[test]
    fn point() {
        let schema = schema("package p\ntype Point struct { Y float32 `json:\"y\"`; X float32 `json:\"x\"` }");
        let bytes = convert(&schema, "Point", &json!({ "x": 1.0, "y": -2.5 })).unwrap();
        assert_eq!(bytes, [0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x20, 0xC0]);
    }

    #[test]
    fn int32_array() {
        let schema = schema("package p\ntype Values []int32");
        let bytes = convert_json_str(&schema, "Values", "[1, 2, 3]").unwrap();
        assert_eq!(
            bytes,
            [0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn optional_string() {
        let schema = schema("package p\ntype Label struct { Text *string `json:\"text\"` }");
        assert_eq!(convert(&schema, "Label", &json!({})).unwrap(), [0x00]);
        assert_eq!(convert(&schema, "Label", &json!({ "text": null })).unwrap(), [0x00]);
        assert_eq!(
            convert(&schema, "Label", &json!({ "text": "hi" })).unwrap(),
            [0x01, 0x02, 0x00, 0x68, 0x69]
        );
    }

    #[test]
    fn canonical_field_order_is_used() {
        let schema = schema("package p\ntype Mixed struct { Name string; Flag bool; Id int64 }");
        let bytes = convert(&schema, "Mixed", &json!({ "Name": "a", "Flag": true, "Id": 2 })).unwrap();
        assert_eq!(bytes, [2, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0, b'a']);
    }

    #[test]
    fn errors_carry_paths() {
        let schema = schema(
            "package p
            type Fleet struct { Devices []Device `json:\"devices\"` }
            type Device struct { Name string `json:\"name\"`; Ports []int16 `json:\"ports\"` }",
        );

        let err = convert(&schema, "Fleet", &json!({ "devices": [{ "name": "a", "ports": [1, "x"] }] })).unwrap_err();
        assert!(
            matches!(&err, FfireError::DataConformance { path, .. } if path == "devices[0].ports[1]"),
            "got {:?}",
            err
        );

        let err = convert(&schema, "Fleet", &json!({ "devices": [{ "ports": [] }] })).unwrap_err();
        assert!(matches!(&err, FfireError::DataConformance { path, problem: Conformance::RequiredField } if path == "devices[0].name"));

        let long = "x".repeat(ffire_wire::MAX_LENGTH + 1);
        let err = convert(&schema, "Fleet", &json!({ "devices": [{ "name": long, "ports": [] }] })).unwrap_err();
        assert!(matches!(&err, FfireError::WireCapacity { path, .. } if path == "devices[0].name"));

        let err = convert_json_str(&schema, "Fleet", "{ not json").unwrap_err();
        assert!(matches!(err, FfireError::Json(_)));
    }
}

use ffire_wire::ByteBuffer;
use log::{debug, warn};
use serde_json::{Map, Number, Value};

use crate::{
    error::FfireError,
    types::{Primitive, Schema, Type, TypeKind},
};

/// Decodes wire bytes of message `message` into JSON, keyed by each field's
/// JSON name. Absent optional fields are left out of their object.
pub fn decode_message(schema: &Schema, message: &str, data: &[u8]) -> Result<Value, FfireError> {
    let message = schema.message(message)?;
    let mut bb = ByteBuffer::new(data);
    let value = read_value(schema, &message.type_, &mut bb)?.unwrap_or(Value::Null);

    if bb.remaining() > 0 {
        warn!(
            "{} trailing bytes after {} at offset {}",
            bb.remaining(),
            message.name,
            bb.index()
        );
    }
    debug!("decoded {} from {} bytes", message.name, data.len());
    Ok(value)
}

/// `None` means an optional value that was not present.
fn read_value(schema: &Schema, type_: &Type, bb: &mut ByteBuffer<'_>) -> Result<Option<Value>, FfireError> {
    if type_.optional && !bb.read_presence()? {
        return Ok(None);
    }

    let value = match &type_.kind {
        TypeKind::Primitive(primitive) => read_primitive(*primitive, bb)?,
        TypeKind::Struct(id) => {
            let mut object = Map::new();
            for field in &schema.struct_def(*id).fields {
                if let Some(value) = read_value(schema, &field.type_, bb)? {
                    object.insert(field.json_name().to_owned(), value);
                }
            }
            Value::Object(object)
        }
        TypeKind::Array(element) => {
            let len = bb.read_len()?;
            let mut items = Vec::with_capacity(len.min(bb.remaining()));
            for _ in 0..len {
                items.push(read_value(schema, element, bb)?.unwrap_or(Value::Null));
            }
            Value::Array(items)
        }
    };
    Ok(Some(value))
}

fn read_primitive(primitive: Primitive, bb: &mut ByteBuffer<'_>) -> Result<Value, FfireError> {
    Ok(match primitive {
        Primitive::Bool => Value::Bool(bb.read_bool()?),
        Primitive::Int8 => Value::from(bb.read_i8()?),
        Primitive::Int16 => Value::from(bb.read_i16()?),
        Primitive::Int32 => Value::from(bb.read_i32()?),
        Primitive::Int64 => Value::from(bb.read_i64()?),
        Primitive::Float32 => float(bb.read_f32()? as f64),
        Primitive::Float64 => float(bb.read_f64()?),
        Primitive::String => Value::String(bb.read_string()?),
    })
}

/// JSON has no NaN or infinity; those decode as `null`.
fn float(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None => {
            warn!("non-finite float {} has no JSON form, writing null", value);
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{canonical::canonicalize, fixture::convert, parser::parse_schema, tokenizer::tokenize_schema};
    use serde_json::json;

    fn schema(text: &str) -> Schema {
        let mut schema = parse_schema(&tokenize_schema(text).unwrap()).unwrap();
        canonicalize(&mut schema);
        schema
    }

    #[test]
    fn inverse_of_fixture_conversion() {
        let schema = schema(
            "package p
            type Fleet struct {
                Name    string   `json:\"name\"`
                Devices []Device `json:\"devices\"`
                Owner   *string  `json:\"owner\"`
            }
            type Device struct {
                Id     int64     `json:\"id\"`
                Active bool      `json:\"active\"`
                Gain   *float64  `json:\"gain\"`
                Levels []int8    `json:\"levels\"`
            }",
        );
        let value = json!({
            "name": "north",
            "devices": [
                { "id": 7, "active": true, "gain": 0.5, "levels": [-1, 2] },
                { "id": -9, "active": false, "levels": [] }
            ],
            "owner": "ops"
        });
        let bytes = convert(&schema, "Fleet", &value).unwrap();
        assert_eq!(decode_message(&schema, "Fleet", &bytes).unwrap(), value);
    }

    #[test]
    fn point_bytes() {
        let schema = schema("package p\ntype Point struct { X float32 `json:\"x\"`; Y float32 `json:\"y\"` }");
        let value = decode_message(&schema, "Point", &[0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x20, 0xC0]).unwrap();
        assert_eq!(value, json!({ "x": 1.0, "y": -2.5 }));
    }

    #[test]
    fn truncated_and_malformed_input() {
        let schema = schema("package p\ntype Name string");
        let err = decode_message(&schema, "Name", &[0x05, 0x00, b'a']).unwrap_err();
        assert!(matches!(err, FfireError::TruncatedInput(_)), "got {:?}", err);
        assert_eq!(err.code(), "E034");

        let err = decode_message(&schema, "Name", &[0x01, 0x00, 0xFF]).unwrap_err();
        assert!(matches!(err, FfireError::MalformedInput(_)), "got {:?}", err);
    }

    #[test]
    fn non_finite_floats_become_null() {
        let schema = schema("package p\ntype Samples []float64");
        let mut bytes = vec![0x01, 0x00];
        bytes.extend_from_slice(&f64::NAN.to_le_bytes());
        assert_eq!(decode_message(&schema, "Samples", &bytes).unwrap(), json!([null]));
    }

    #[test]
    fn nonzero_bytes_are_true_and_present() {
        let schema = schema("package p\ntype Flag struct { On bool; Maybe *bool }");
        let value = decode_message(&schema, "Flag", &[0x02, 0x07, 0x01]).unwrap();
        assert_eq!(value, json!({ "On": true, "Maybe": true }));
    }
}

use std::collections::{HashMap, HashSet};

use ffire_wire::{LengthKind, WireError, MAX_LENGTH};
use log::debug;
use serde_json::Value;

use crate::{
    error::{Conformance, FfireError, Structural},
    naming::{cpp_field_name, rust_field_name, to_pascal_case, to_snake_case},
    types::{Primitive, Schema, StructId, Type, TypeKind},
    utils::{field_path, index_path},
};

/// Deepest struct-in-struct nesting a schema may declare.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Type names that generated code declares or imports next to the schema's
/// own types.
pub const RESERVED_NAMES: [&str; 15] = [
    "ByteBuffer",
    "ByteBufferMut",
    "Scalar",
    "WireError",
    "Result",
    "Option",
    "Vec",
    "String",
    "Box",
    "Serialize",
    "Deserialize",
    "Encoder",
    "Decoder",
    "CapacityError",
    "TruncatedError",
];

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Returns `Ok(())` if the schema is well formed. Runs on the schema as parsed,
/// before canonicalization.
pub fn validate_schema(schema: &Schema) -> Result<(), FfireError> {
    if schema.package.trim().is_empty() {
        return Err(FfireError::SchemaStructural(Structural::EmptyPackage));
    }
    if schema.messages.is_empty() {
        return Err(FfireError::NoRootType);
    }

    for def in &schema.structs {
        if def.fields.is_empty() {
            return Err(FfireError::SchemaStructural(Structural::EmptyStruct(def.name.clone())));
        }
        let mut seen = HashSet::new();
        for field in &def.fields {
            if field.name.is_empty() {
                return Err(FfireError::SchemaStructural(Structural::EmptyFieldName(def.name.clone())));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(FfireError::SchemaStructural(Structural::DuplicateField {
                    type_name: def.name.clone(),
                    field:     field.name.clone(),
                }));
            }
        }
    }

    check_generated_names(schema)?;
    check_cycles(schema)?;
    check_nesting(schema)?;

    debug!("schema {:?} passed validation", schema.package);
    Ok(())
}

/// Every type, message function and field must map to its own identifier in
/// generated code, and no type may take a name that code already uses.
fn check_generated_names(schema: &Schema) -> Result<(), FfireError> {
    let mut types = HashMap::new();
    let mut functions = HashMap::new();
    for decl in &schema.declarations {
        let type_name = to_pascal_case(&decl.name);
        if RESERVED_NAMES.contains(&type_name.as_str()) {
            return Err(FfireError::SchemaStructural(Structural::ReservedName(decl.name.clone())));
        }
        claim(&mut types, type_name, &decl.name)?;
        if schema.messages.iter().any(|message| message.name == decl.name) {
            claim(&mut functions, to_snake_case(&decl.name), &decl.name)?;
        }
    }

    for def in &schema.structs {
        let mut rust = HashMap::new();
        let mut cpp = HashMap::new();
        for field in &def.fields {
            claim(&mut rust, rust_field_name(&field.name), &field.name)?;
            claim(&mut cpp, cpp_field_name(&field.name), &field.name)?;
        }
    }
    Ok(())
}

fn claim<'a>(seen: &mut HashMap<String, &'a str>, generated: String, name: &'a str) -> Result<(), FfireError> {
    if let Some(first) = seen.get(&generated) {
        return Err(FfireError::SchemaStructural(Structural::NameCollision {
            first: first.to_string(),
            second: name.to_owned(),
            generated,
        }));
    }
    seen.insert(generated, name);
    Ok(())
}

fn check_cycles(schema: &Schema) -> Result<(), FfireError> {
    fn visit(
        schema: &Schema,
        id: StructId,
        marks: &mut [Mark],
        stack: &mut Vec<StructId>,
    ) -> Result<(), FfireError> {
        match marks[id.0] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let start = stack.iter().position(|open| *open == id).unwrap_or(0);
                let mut names: Vec<&str> = stack[start..]
                    .iter()
                    .map(|open| schema.struct_def(*open).name.as_str())
                    .collect();
                names.push(&schema.struct_def(id).name);
                return Err(FfireError::CircularReference(names.join(" -> ")));
            }
            Mark::Unvisited => {}
        }

        marks[id.0] = Mark::Visiting;
        stack.push(id);
        for field in &schema.struct_def(id).fields {
            if let Some(target) = field.type_.innermost_struct() {
                visit(schema, target, marks, stack)?;
            }
        }
        stack.pop();
        marks[id.0] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; schema.structs.len()];
    let mut stack = Vec::new();
    for id in (0..schema.structs.len()).map(StructId) {
        visit(schema, id, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// Depth of each struct: 0 with no struct fields, else 1 + deepest struct field.
/// Only called once the graph is known to be acyclic.
fn check_nesting(schema: &Schema) -> Result<(), FfireError> {
    fn depth(schema: &Schema, id: StructId, memo: &mut [Option<usize>]) -> usize {
        if let Some(known) = memo[id.0] {
            return known;
        }
        let deepest = schema
            .struct_def(id)
            .fields
            .iter()
            .filter_map(|field| field.type_.innermost_struct())
            .map(|target| 1 + depth(schema, target, memo))
            .max()
            .unwrap_or(0);
        memo[id.0] = Some(deepest);
        deepest
    }

    let mut memo = vec![None; schema.structs.len()];
    for id in (0..schema.structs.len()).map(StructId) {
        let found = depth(schema, id, &mut memo);
        if found > MAX_NESTING_DEPTH {
            return Err(FfireError::MaxNestingDepth {
                name:  schema.struct_def(id).name.clone(),
                depth: found,
                max:   MAX_NESTING_DEPTH,
            });
        }
    }
    Ok(())
}

/// Checks that `value` can be encoded as the message `message`. Stops at the
/// first problem and reports it with the path of the offending value.
pub fn validate_data(schema: &Schema, message: &str, value: &Value) -> Result<(), FfireError> {
    let message = schema.message(message)?;
    check_value(schema, &message.type_, value, "")
}

fn check_value(schema: &Schema, type_: &Type, value: &Value, path: &str) -> Result<(), FfireError> {
    if value.is_null() {
        return if type_.optional {
            Ok(())
        } else {
            Err(FfireError::data(path, Conformance::RequiredField))
        };
    }

    match &type_.kind {
        TypeKind::Primitive(primitive) => check_primitive(*primitive, value, path),
        TypeKind::Struct(id) => {
            let object = value
                .as_object()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("object")))?;
            for field in &schema.struct_def(*id).fields {
                let key = field.json_name();
                match object.get(key) {
                    Some(item) => check_value(schema, &field.type_, item, &field_path(path, key))?,
                    None if field.type_.optional => {}
                    None => return Err(FfireError::data(&field_path(path, key), Conformance::RequiredField)),
                }
            }
            Ok(())
        }
        TypeKind::Array(element) => {
            let items = value
                .as_array()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("array")))?;
            check_length(items.len(), LengthKind::Array, path)?;
            for (index, item) in items.iter().enumerate() {
                check_value(schema, element, item, &index_path(path, index))?;
            }
            Ok(())
        }
    }
}

fn check_length(len: usize, kind: LengthKind, path: &str) -> Result<(), FfireError> {
    if len > MAX_LENGTH {
        return Err(FfireError::WireCapacity {
            path:   path.to_owned(),
            source: WireError::Capacity { kind, len, max: MAX_LENGTH },
        });
    }
    Ok(())
}

fn check_primitive(primitive: Primitive, value: &Value, path: &str) -> Result<(), FfireError> {
    match primitive {
        Primitive::Bool => {
            value
                .as_bool()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("boolean")))?;
        }
        Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64 => {
            integer_value(primitive, value, path)?;
        }
        Primitive::Float32 => {
            let number = value
                .as_f64()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("number")))?;
            if number.is_finite() && number.abs() > f32::MAX as f64 {
                return Err(FfireError::data(
                    path,
                    Conformance::OutOfRange { value: number.to_string(), type_name: "float32" },
                ));
            }
        }
        Primitive::Float64 => {
            value
                .as_f64()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("number")))?;
        }
        Primitive::String => {
            let text = value
                .as_str()
                .ok_or_else(|| FfireError::data(path, Conformance::Expected("string")))?;
            check_length(text.len(), LengthKind::String, path)?;
        }
    }
    Ok(())
}

/// Reads a JSON number as an integer of the given width. Integral floats such
/// as `3.0` are accepted.
pub(crate) fn integer_value(primitive: Primitive, value: &Value, path: &str) -> Result<i64, FfireError> {
    let wide: i128 = if let Some(signed) = value.as_i64() {
        signed as i128
    } else if let Some(unsigned) = value.as_u64() {
        unsigned as i128
    } else {
        match value.as_f64() {
            Some(float) if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e30 => float as i128,
            _ => return Err(FfireError::data(path, Conformance::Expected("integer"))),
        }
    };

    let (min, max): (i128, i128) = match primitive {
        Primitive::Int8 => (i8::MIN as i128, i8::MAX as i128),
        Primitive::Int16 => (i16::MIN as i128, i16::MAX as i128),
        Primitive::Int32 => (i32::MIN as i128, i32::MAX as i128),
        _ => (i64::MIN as i128, i64::MAX as i128),
    };
    if wide < min || wide > max {
        return Err(FfireError::data(
            path,
            Conformance::OutOfRange { value: wide.to_string(), type_name: primitive.name() },
        ));
    }
    Ok(wide as i64)
}

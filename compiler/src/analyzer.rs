use std::{collections::BTreeMap, convert::Infallible};

use ffire_wire::{LENGTH_PREFIX_SIZE, MAX_LENGTH, PRESENCE_SIZE};
use log::{debug, trace};
use serde::Serialize;

use crate::{
    error::FfireError,
    types::{Primitive, Schema, StructId, Type, TypeKind},
};

/// Layout facts for one type. Sizes are in bytes and saturate at `usize::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub is_fixed_size: bool,
    /// Encoded size when `is_fixed_size`, else 0.
    pub fixed_size:    usize,
    /// Upper bound on the encoded size.
    pub max_size:      usize,
    pub has_strings:   bool,
    pub has_arrays:    bool,
    pub nest_depth:    usize,
}

impl TypeInfo {
    fn primitive(primitive: Primitive) -> TypeInfo {
        match primitive.fixed_size() {
            Some(size) => TypeInfo {
                is_fixed_size: true,
                fixed_size:    size,
                max_size:      size,
                has_strings:   false,
                has_arrays:    false,
                nest_depth:    0,
            },
            None => TypeInfo {
                is_fixed_size: false,
                fixed_size:    0,
                max_size:      LENGTH_PREFIX_SIZE + MAX_LENGTH,
                has_strings:   true,
                has_arrays:    false,
                nest_depth:    0,
            },
        }
    }

    fn optional(inner: TypeInfo) -> TypeInfo {
        TypeInfo {
            is_fixed_size: false,
            fixed_size: 0,
            max_size: inner.max_size.saturating_add(PRESENCE_SIZE),
            ..inner
        }
    }

    fn array(element: TypeInfo) -> TypeInfo {
        TypeInfo {
            is_fixed_size: false,
            fixed_size: 0,
            max_size: element
                .max_size
                .saturating_mul(MAX_LENGTH)
                .saturating_add(LENGTH_PREFIX_SIZE),
            has_arrays: true,
            ..element
        }
    }
}

/// Builds the info of `type_`, asking `struct_info` for any struct it names.
fn describe<E, F>(type_: &Type, struct_info: &mut F) -> Result<TypeInfo, E>
where
    F: FnMut(StructId) -> Result<TypeInfo, E>,
{
    let info = match &type_.kind {
        TypeKind::Primitive(primitive) => TypeInfo::primitive(*primitive),
        TypeKind::Struct(id) => struct_info(*id)?,
        TypeKind::Array(element) => TypeInfo::array(describe(element, struct_info)?),
    };
    Ok(if type_.optional { TypeInfo::optional(info) } else { info })
}

/// Layout facts for a whole schema, computed once after canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// Indexed by `StructId`.
    pub structs:      Vec<TypeInfo>,
    pub declarations: BTreeMap<String, TypeInfo>,
    pub messages:     BTreeMap<String, TypeInfo>,
}

impl Analysis {
    pub fn struct_info(&self, id: StructId) -> &TypeInfo {
        &self.structs[id.0]
    }

    pub fn message(&self, name: &str) -> Option<&TypeInfo> {
        self.messages.get(name)
    }

    /// Info for any type built from this schema's structs.
    pub fn type_info(&self, type_: &Type) -> TypeInfo {
        let found: Result<TypeInfo, Infallible> = describe(type_, &mut |id| Ok(self.structs[id.0]));
        match found {
            Ok(info) => info,
            Err(never) => match never {},
        }
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Pending,
    Visiting,
    Done(TypeInfo),
}

struct Analyzer<'a> {
    schema: &'a Schema,
    slots:  Vec<Slot>,
    stack:  Vec<StructId>,
}

impl<'a> Analyzer<'a> {
    fn struct_info(&mut self, id: StructId) -> Result<TypeInfo, FfireError> {
        match self.slots[id.0] {
            Slot::Done(info) => return Ok(info),
            Slot::Visiting => {
                let schema = self.schema;
                let start = self.stack.iter().position(|open| *open == id).unwrap_or(0);
                let mut names: Vec<&str> = self.stack[start..]
                    .iter()
                    .map(|open| schema.struct_def(*open).name.as_str())
                    .collect();
                names.push(&schema.struct_def(id).name);
                return Err(FfireError::CircularType(names.join(" -> ")));
            }
            Slot::Pending => {}
        }

        self.slots[id.0] = Slot::Visiting;
        self.stack.push(id);

        let schema = self.schema;
        let def = schema.struct_def(id);
        let mut info = TypeInfo {
            is_fixed_size: true,
            fixed_size:    0,
            max_size:      0,
            has_strings:   false,
            has_arrays:    false,
            nest_depth:    0,
        };
        for field in &def.fields {
            let field_info = describe(&field.type_, &mut |inner| self.struct_info(inner))?;
            info.is_fixed_size &= field_info.is_fixed_size;
            info.max_size = info.max_size.saturating_add(field_info.max_size);
            info.has_strings |= field_info.has_strings;
            info.has_arrays |= field_info.has_arrays;
            if field.type_.innermost_struct().is_some() {
                info.nest_depth = info.nest_depth.max(field_info.nest_depth + 1);
            }
        }
        if info.is_fixed_size {
            info.fixed_size = info.max_size;
        }

        trace!("{} -> {:?}", def.name, info);
        self.stack.pop();
        self.slots[id.0] = Slot::Done(info);
        Ok(info)
    }
}

/// Computes `TypeInfo` for every struct, declaration and message.
pub fn analyze(schema: &Schema) -> Result<Analysis, FfireError> {
    let mut analyzer = Analyzer {
        schema,
        slots: vec![Slot::Pending; schema.structs.len()],
        stack: Vec::new(),
    };

    let mut structs = Vec::with_capacity(schema.structs.len());
    for id in (0..schema.structs.len()).map(StructId) {
        structs.push(analyzer.struct_info(id)?);
    }

    let mut lookup = |id: StructId| analyzer.struct_info(id);

    let mut declarations = BTreeMap::new();
    for decl in &schema.declarations {
        declarations.insert(decl.name.clone(), describe(&decl.type_, &mut lookup)?);
    }
    let mut messages = BTreeMap::new();
    for message in &schema.messages {
        messages.insert(message.name.clone(), describe(&message.type_, &mut lookup)?);
    }

    debug!("analyzed {} structs, {} messages", structs.len(), messages.len());
    Ok(Analysis {
        structs,
        declarations,
        messages,
    })
}

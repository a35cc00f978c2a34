use std::ops::Range;

use log::debug;

use crate::types::{Field, Schema, StructId, Type, TypeKind};

/// Wire position class of a field. Fields are laid out by category, then by
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldCategory {
    /// 8-byte primitives and fixed-size nested structs.
    Fixed8,
    Fixed4,
    Fixed2,
    Fixed1,
    /// Required strings, arrays and variable-size structs.
    Variable,
    Optional,
}

#[derive(Clone, Copy, PartialEq)]
enum Fixedness {
    Unknown,
    Visiting,
    Known(bool),
}

/// Answers "is this struct fixed-size" for one schema, memoized per struct.
struct FixedStructs<'a> {
    schema: &'a Schema,
    state:  Vec<Fixedness>,
}

impl<'a> FixedStructs<'a> {
    fn new(schema: &'a Schema) -> Self {
        FixedStructs {
            schema,
            state: vec![Fixedness::Unknown; schema.structs.len()],
        }
    }

    fn is_fixed_struct(&mut self, id: StructId) -> bool {
        match self.state[id.0] {
            Fixedness::Known(fixed) => return fixed,
            // A struct on its own path can't be fixed-size.
            Fixedness::Visiting => return false,
            Fixedness::Unknown => {}
        }
        self.state[id.0] = Fixedness::Visiting;
        let schema = self.schema;
        let fixed = schema
            .struct_def(id)
            .fields
            .iter()
            .all(|field| self.is_fixed_type(&field.type_));
        self.state[id.0] = Fixedness::Known(fixed);
        fixed
    }

    fn is_fixed_type(&mut self, type_: &Type) -> bool {
        if type_.optional {
            return false;
        }
        match &type_.kind {
            TypeKind::Primitive(primitive) => primitive.fixed_size().is_some(),
            TypeKind::Struct(id) => self.is_fixed_struct(*id),
            TypeKind::Array(_) => false,
        }
    }

    fn category(&mut self, field: &Field) -> FieldCategory {
        if field.type_.optional {
            return FieldCategory::Optional;
        }
        match &field.type_.kind {
            TypeKind::Primitive(primitive) => match primitive.fixed_size() {
                Some(8) => FieldCategory::Fixed8,
                Some(4) => FieldCategory::Fixed4,
                Some(2) => FieldCategory::Fixed2,
                Some(_) => FieldCategory::Fixed1,
                None => FieldCategory::Variable,
            },
            TypeKind::Struct(id) if self.is_fixed_struct(*id) => FieldCategory::Fixed8,
            _ => FieldCategory::Variable,
        }
    }
}

/// The category of one field of `schema`.
pub fn field_category(schema: &Schema, field: &Field) -> FieldCategory {
    FixedStructs::new(schema).category(field)
}

/// Reorders every struct's fields into canonical wire order. Running it twice
/// changes nothing.
pub fn canonicalize(schema: &mut Schema) {
    let keys: Vec<Vec<(FieldCategory, String)>> = {
        let mut fixed = FixedStructs::new(schema);
        schema
            .structs
            .iter()
            .map(|def| {
                def.fields
                    .iter()
                    .map(|field| (fixed.category(field), field.name.clone()))
                    .collect()
            })
            .collect()
    };

    for (def, keys) in schema.structs.iter_mut().zip(keys) {
        let mut keyed: Vec<_> = keys.into_iter().zip(def.fields.drain(..)).collect();
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        def.fields = keyed.into_iter().map(|(_, field)| field).collect();
        debug!(
            "canonical order for {}: [{}]",
            def.name,
            def.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
        );
    }
}

/// Whether every struct's fields are already in canonical order.
pub fn is_canonical(schema: &Schema) -> bool {
    let mut fixed = FixedStructs::new(schema);
    schema.structs.iter().all(|def| {
        let keys: Vec<_> = def
            .fields
            .iter()
            .map(|field| (fixed.category(field), field.name.as_str()))
            .collect();
        keys.windows(2).all(|pair| pair[0] <= pair[1])
    })
}

/// Maximal runs of adjacent required fixed-width primitive fields in a
/// struct, as index ranges into its field list. Decoders can bounds-check a
/// whole run at once.
pub fn fixed_field_runs(schema: &Schema, id: StructId) -> Vec<Range<usize>> {
    let fields = &schema.struct_def(id).fields;
    let mut runs = Vec::new();
    let mut start = None;

    for (index, field) in fields.iter().enumerate() {
        let fixed = !field.type_.optional
            && matches!(&field.type_.kind, TypeKind::Primitive(p) if p.fixed_size().is_some());
        match (fixed, start) {
            (true, None) => start = Some(index),
            (false, Some(begin)) => {
                runs.push(begin..index);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        runs.push(begin..fields.len());
    }
    runs
}

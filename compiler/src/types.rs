use serde::Serialize;

use crate::error::FfireError;

/// Names of the built-in primitive types, in `Primitive` order.
pub const PRIMITIVE_NAMES: [&str; 8] = [
    "bool", "int8", "int16", "int32", "int64", "float32", "float64", "string",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl Primitive {
    pub const ALL: [Primitive; 8] = [
        Primitive::Bool,
        Primitive::Int8,
        Primitive::Int16,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::Float32,
        Primitive::Float64,
        Primitive::String,
    ];

    pub fn from_name(name: &str) -> Option<Primitive> {
        PRIMITIVE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| Primitive::ALL[index])
    }

    pub fn name(self) -> &'static str {
        PRIMITIVE_NAMES[self as usize]
    }

    /// Encoded width, or `None` for strings.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Primitive::Bool | Primitive::Int8 => Some(1),
            Primitive::Int16 => Some(2),
            Primitive::Int32 | Primitive::Float32 => Some(4),
            Primitive::Int64 | Primitive::Float64 => Some(8),
            Primitive::String => None,
        }
    }

    /// Integers and floats; eligible for bulk array copies.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Primitive::Bool | Primitive::String)
    }
}

/// Handle of a struct in `Schema::structs`. Every reference to a named struct
/// shares the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StructId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeKind {
    Primitive(Primitive),
    Struct(StructId),
    Array(Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type {
    pub kind:     TypeKind,
    pub optional: bool,
}

impl Type {
    pub fn primitive(primitive: Primitive) -> Type {
        Type { kind: TypeKind::Primitive(primitive), optional: false }
    }

    pub fn structure(id: StructId) -> Type {
        Type { kind: TypeKind::Struct(id), optional: false }
    }

    pub fn array(element: Type) -> Type {
        Type { kind: TypeKind::Array(Box::new(element)), optional: false }
    }

    pub fn into_optional(mut self) -> Type {
        self.optional = true;
        self
    }

    /// The same type with the optional flag cleared.
    pub fn required(&self) -> Type {
        Type { kind: self.kind.clone(), optional: false }
    }

    /// The struct reached by stripping arrays, if any.
    pub fn innermost_struct(&self) -> Option<StructId> {
        match &self.kind {
            TypeKind::Struct(id) => Some(*id),
            TypeKind::Array(element) => element.innermost_struct(),
            TypeKind::Primitive(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    #[serde(rename = "type")]
    pub type_:  Type,
    pub tag:    Option<String>,
}

impl Field {
    /// The key this field uses in JSON fixtures: the name from a `json:"..."`
    /// tag entry, or the field name.
    pub fn json_name(&self) -> &str {
        self.tag
            .as_deref()
            .and_then(|tag| tag_value(tag, "json"))
            .map(|value| value.split(',').next().unwrap_or(value))
            .filter(|name| !name.is_empty() && *name != "-")
            .unwrap_or(self.name.as_str())
    }
}

/// Looks up `key:"value"` in a struct tag.
fn tag_value<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let mut rest = tag.trim();
    while !rest.is_empty() {
        let colon = rest.find(':')?;
        let name = rest[..colon].trim();
        let after = rest[colon + 1..].strip_prefix('"')?;
        let end = after.find('"')?;
        if name == key {
            return Some(&after[..end]);
        }
        rest = after[end + 1..].trim_start();
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructDef {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub fields: Vec<Field>,
}

/// A top-level `type Name ...` declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    #[serde(rename = "type")]
    pub type_:  Type,
}

/// A root declaration that gets public encode/decode entry points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub name:  String,
    #[serde(rename = "type")]
    pub type_: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub package:      String,
    pub structs:      Vec<StructDef>,
    pub declarations: Vec<Declaration>,
    pub messages:     Vec<Message>,
}

impl Schema {
    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0]
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|decl| decl.name == name)
    }

    pub fn message(&self, name: &str) -> Result<&Message, FfireError> {
        self.messages
            .iter()
            .find(|message| message.name == name)
            .ok_or_else(|| FfireError::MessageNotFound(name.to_owned()))
    }

    /// Whether a struct is the type of some message.
    pub fn is_message_struct(&self, id: StructId) -> bool {
        self.messages
            .iter()
            .any(|message| message.type_.kind == TypeKind::Struct(id))
    }

    /// Source-like spelling of a type, e.g. `[]*Device`.
    pub fn type_name(&self, type_: &Type) -> String {
        let base = match &type_.kind {
            TypeKind::Primitive(primitive) => primitive.name().to_owned(),
            TypeKind::Struct(id) => self.struct_def(*id).name.clone(),
            TypeKind::Array(element) => format!("[]{}", self.type_name(element)),
        };
        if type_.optional {
            format!("*{}", base)
        } else {
            base
        }
    }
}

/// Exported names start with an ASCII uppercase letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_with_tag(name: &str, tag: Option<&str>) -> Field {
        Field {
            name:   name.to_owned(),
            line:   1,
            column: 1,
            type_:  Type::primitive(Primitive::Int32),
            tag:    tag.map(str::to_owned),
        }
    }

    #[test]
    fn json_name_from_tag() {
        assert_eq!(field_with_tag("X", None).json_name(), "X");
        assert_eq!(field_with_tag("X", Some(r#"json:"x""#)).json_name(), "x");
        assert_eq!(field_with_tag("Owner", Some(r#"json:"owner,omitempty""#)).json_name(), "owner");
        assert_eq!(field_with_tag("Id", Some(r#"xml:"ident" json:"id""#)).json_name(), "id");
        assert_eq!(field_with_tag("Id", Some(r#"json:",omitempty""#)).json_name(), "Id");
        assert_eq!(field_with_tag("Id", Some("garbage")).json_name(), "Id");
    }

    #[test]
    fn primitive_names_round_trip() {
        for primitive in Primitive::ALL {
            assert_eq!(Primitive::from_name(primitive.name()), Some(primitive));
        }
        assert_eq!(Primitive::from_name("int"), None);
        assert_eq!(Primitive::Float64.fixed_size(), Some(8));
        assert_eq!(Primitive::String.fixed_size(), None);
        assert!(!Primitive::Bool.is_numeric());
    }

    #[test]
    fn exported_names() {
        assert!(is_exported("Device"));
        assert!(!is_exported("device"));
        assert!(!is_exported("_Device"));
        assert!(!is_exported(""));
    }
}

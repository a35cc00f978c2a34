use std::fmt;

use ffire_wire::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FfireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    Parse {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Undefined type \"{name}\" at line {line}, column {column}")]
    UndefinedType {
        name:   String,
        line:   usize,
        column: usize,
    },

    #[error("Unsupported construct at line {line}, column {column}: {msg}")]
    UnsupportedConstruct {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("No message type found: at least one exported type must not be referenced by any other type")]
    NoRootType,

    #[error("Circular type: {0}")]
    CircularType(String),

    #[error("Circular reference detected: {0}")]
    CircularReference(String),

    #[error("Type \"{name}\" nests {depth} levels deep, exceeding the maximum of {max}")]
    MaxNestingDepth {
        name:  String,
        depth: usize,
        max:   usize,
    },

    #[error("Invalid schema: {0}")]
    SchemaStructural(Structural),

    #[error("Invalid data at \"{path}\": {problem}")]
    DataConformance {
        path:    String,
        problem: Conformance,
    },

    #[error("Wire capacity exceeded at \"{path}\": {source}")]
    WireCapacity {
        path:   String,
        source: WireError,
    },

    #[error("Truncated input: {0}")]
    TruncatedInput(WireError),

    #[error("Malformed input: {0}")]
    MalformedInput(WireError),

    #[error("The {backend} backend cannot represent type {type_name}")]
    UnsupportedType {
        backend:   String,
        type_name: String,
    },

    #[error("Message \"{0}\" not found in schema")]
    MessageNotFound(String),
}

/// Structural schema problems caught before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structural {
    EmptyPackage,
    EmptyStruct(String),
    EmptyFieldName(String),
    DuplicateField { type_name: String, field: String },
    /// A type name that generated code already uses for its own items.
    ReservedName(String),
    /// Two distinct schema names that map to the same generated identifier.
    NameCollision { first: String, second: String, generated: String },
}

impl fmt::Display for Structural {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structural::EmptyPackage => write!(f, "package name is required"),
            Structural::EmptyStruct(name) => write!(f, "struct {} has no fields", name),
            Structural::EmptyFieldName(name) => write!(f, "struct {} has a field with an empty name", name),
            Structural::DuplicateField { type_name, field } => {
                write!(f, "struct {} declares field {} twice", type_name, field)
            }
            Structural::ReservedName(name) => {
                write!(f, "type name {} is reserved by the generated code", name)
            }
            Structural::NameCollision { first, second, generated } => {
                write!(f, "{} and {} both generate the identifier {}", first, second, generated)
            }
        }
    }
}

/// Why a data value does not conform to its schema type.
#[derive(Debug, Clone, PartialEq)]
pub enum Conformance {
    RequiredField,
    Expected(&'static str),
    OutOfRange { value: String, type_name: &'static str },
}

impl fmt::Display for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conformance::RequiredField => write!(f, "required field missing"),
            Conformance::Expected(what) => write!(f, "expected {}", what),
            Conformance::OutOfRange { value, type_name } => {
                write!(f, "value {} out of range for {}", value, type_name)
            }
        }
    }
}

impl From<WireError> for FfireError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Capacity { .. } => FfireError::WireCapacity {
                path:   String::new(),
                source: err,
            },
            WireError::Truncated { .. } => FfireError::TruncatedInput(err),
            WireError::InvalidUtf8 { .. } => FfireError::MalformedInput(err),
        }
    }
}

impl FfireError {
    pub(crate) fn data(path: &str, problem: Conformance) -> Self {
        FfireError::DataConformance {
            path: path.to_owned(),
            problem,
        }
    }

    /// Attaches a value path to a capacity error raised by the wire writer.
    pub(crate) fn at_path(self, path: &str) -> Self {
        match self {
            FfireError::WireCapacity { source, .. } => FfireError::WireCapacity {
                path: path.to_owned(),
                source,
            },
            other => other,
        }
    }

    /// Stable diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            FfireError::Io(_) => "E029",
            FfireError::Json(_) => "E014",
            FfireError::Parse { .. } => "E031",
            FfireError::UndefinedType { .. } => "E005",
            FfireError::UnsupportedConstruct { .. } => "E012",
            FfireError::NoRootType => "E002",
            FfireError::CircularType(_) | FfireError::CircularReference(_) => "E010",
            FfireError::MaxNestingDepth { .. } => "E011",
            FfireError::SchemaStructural(kind) => match kind {
                Structural::EmptyPackage => "E001",
                Structural::EmptyStruct(_) => "E006",
                Structural::EmptyFieldName(_) => "E007",
                Structural::DuplicateField { .. } | Structural::NameCollision { .. } => "E033",
                Structural::ReservedName(_) => "E036",
            },
            FfireError::DataConformance { problem, .. } => match problem {
                Conformance::RequiredField => "E015",
                Conformance::Expected("integer") => "E017",
                Conformance::Expected("number") => "E018",
                Conformance::Expected("string") => "E019",
                Conformance::Expected("object") => "E020",
                Conformance::Expected("array") => "E021",
                Conformance::Expected("boolean") => "E022",
                Conformance::Expected(_) => "E016",
                Conformance::OutOfRange { type_name: "int8", .. } => "E023",
                Conformance::OutOfRange { type_name: "int16", .. } => "E024",
                Conformance::OutOfRange { type_name: "int32", .. } => "E025",
                Conformance::OutOfRange { .. } => "E016",
            },
            FfireError::WireCapacity { source, .. } => match source {
                WireError::Capacity { kind: ffire_wire::LengthKind::String, .. } => "E026",
                _ => "E027",
            },
            FfireError::TruncatedInput(_) => "E034",
            FfireError::MalformedInput(_) => "E035",
            FfireError::UnsupportedType { .. } => "E028",
            FfireError::MessageNotFound(_) => "E013",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffire_wire::LengthKind;

    #[test]
    fn wire_errors_map_to_kinds() {
        let err: FfireError = WireError::Truncated { offset: 3, needed: 4, remaining: 1 }.into();
        assert!(matches!(err, FfireError::TruncatedInput(_)));

        let err: FfireError = WireError::Capacity { kind: LengthKind::Array, len: 65536, max: 65535 }.into();
        let err = err.at_path("devices");
        assert_eq!(err.code(), "E027");
        assert_eq!(
            err.to_string(),
            "Wire capacity exceeded at \"devices\": array element count 65536 exceeds the maximum of 65535"
        );
    }

    #[test]
    fn conformance_codes() {
        assert_eq!(FfireError::data("a.b", Conformance::RequiredField).code(), "E015");
        assert_eq!(FfireError::data("x", Conformance::Expected("boolean")).code(), "E022");
        let err = FfireError::data(
            "values[2]",
            Conformance::OutOfRange { value: "300".into(), type_name: "int8" },
        );
        assert_eq!(err.code(), "E023");
        assert_eq!(err.to_string(), "Invalid data at \"values[2]\": value 300 out of range for int8");
    }
}

//! ffire
//!
//! This crate provides runtime support for working with ffire-encoded data.
//!
//! - The wire buffers generated Rust code is written against
//!   (`ByteBuffer`, `ByteBufferMut`, `Scalar`, `WireError`)
//! - The schema compiler (`compile_schema`, `CompiledSchema`)
//! - JSON helpers for fixtures and debugging

pub use ffire_compiler::error::FfireError;
pub use ffire_compiler::{compile_schema, compile_schema_file, CompiledSchema, GenerateOptions, Language};
pub use ffire_wire::{ByteBuffer, ByteBufferMut, LengthKind, Scalar, WireError, MAX_LENGTH};

/// Encode a JSON fixture as the wire bytes of `message`, validating it against
/// the schema first.
pub fn encode_fixture(schema_text: &str, message: &str, json: &str) -> Result<Vec<u8>, FfireError> {
    let compiled = compile_schema(schema_text)?;
    let value: serde_json::Value = serde_json::from_str(json)?;
    compiled.convert_fixture(message, &value)
}

/// Decode a `message` buffer into a pretty-printed JSON string.
pub fn decode_to_json(schema_text: &str, message: &str, buffer: &[u8]) -> Result<String, FfireError> {
    let compiled = compile_schema(schema_text)?;
    let value = compiled.decode_to_json(message, buffer)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

pub mod error {
    pub use ffire_compiler::error::FfireError;
    pub use ffire_wire::WireError;
}

pub mod wire {
    pub use ffire_wire::*;
}

pub mod compiler {
    pub use ffire_compiler::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINT: &str = "package geo\ntype Point struct { X float32 `json:\"x\"`; Y float32 `json:\"y\"` }";

    #[test]
    fn fixture_round_trip() {
        let bytes = encode_fixture(POINT, "Point", r#"{ "x": 1.0, "y": -2.5 }"#).unwrap();
        assert_eq!(bytes, [0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x20, 0xC0]);

        let json = decode_to_json(POINT, "Point", &bytes).unwrap();
        assert_eq!(json, "{\n  \"x\": 1.0,\n  \"y\": -2.5\n}");
    }

    #[test]
    fn errors_pass_through() {
        assert!(matches!(encode_fixture(POINT, "Line", "{}"), Err(FfireError::MessageNotFound(_))));
        assert!(matches!(decode_to_json(POINT, "Point", &[0, 0]), Err(FfireError::TruncatedInput(_))));
    }
}

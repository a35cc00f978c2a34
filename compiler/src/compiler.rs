use std::{fs, path::Path};

use log::{debug, info};
use serde_json::Value;

use crate::{
    analyzer::{analyze, Analysis},
    canonical::canonicalize,
    codegen::{self, GeneratedFile, GenerateOptions, Language},
    decode::decode_message,
    error::FfireError,
    fixture,
    parser::parse_schema,
    tokenizer::tokenize_schema,
    types::Schema,
    validator::{validate_data, validate_schema},
};

/// A schema that has been parsed, validated, canonicalized and analyzed. It is
/// never mutated afterwards and can be shared between threads.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    pub schema:   Schema,
    pub analysis: Analysis,
}

/// Compile schema text.
/// Returns `Err(FfireError)` if tokenization, parsing, validation or analysis fails.
pub fn compile_schema(text: &str) -> Result<CompiledSchema, FfireError> {
    let tokens = tokenize_schema(text)?;
    debug!("tokenized schema: {} tokens", tokens.len());
    let mut schema = parse_schema(&tokens)?;
    validate_schema(&schema)?;
    canonicalize(&mut schema);
    let analysis = analyze(&schema)?;
    info!(
        "compiled package {}: {} structs, {} messages",
        schema.package,
        schema.structs.len(),
        schema.messages.len()
    );
    Ok(CompiledSchema { schema, analysis })
}

/// Reads and compiles a schema file.
pub fn compile_schema_file(path: impl AsRef<Path>) -> Result<CompiledSchema, FfireError> {
    let path = path.as_ref();
    debug!("reading schema {}", path.display());
    let text = fs::read_to_string(path)?;
    compile_schema(&text)
}

impl CompiledSchema {
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.schema.messages.iter().map(|message| message.name.as_str())
    }

    /// The message to use when the caller didn't name one: the only message,
    /// if there is exactly one.
    pub fn sole_message(&self) -> Option<&str> {
        match self.schema.messages.as_slice() {
            [only] => Some(only.name.as_str()),
            _ => None,
        }
    }

    pub fn validate_data(&self, message: &str, value: &Value) -> Result<(), FfireError> {
        validate_data(&self.schema, message, value)
    }

    /// Validates `value` and encodes it as wire bytes.
    pub fn convert_fixture(&self, message: &str, value: &Value) -> Result<Vec<u8>, FfireError> {
        validate_data(&self.schema, message, value)?;
        fixture::convert(&self.schema, message, value)
    }

    pub fn decode_to_json(&self, message: &str, data: &[u8]) -> Result<Value, FfireError> {
        decode_message(&self.schema, message, data)
    }

    pub fn generate(&self, language: Language, options: &GenerateOptions) -> Result<GeneratedFile, FfireError> {
        codegen::generate(&self.schema, &self.analysis, language, options)
    }

    pub fn generate_message(
        &self,
        language: Language,
        message: &str,
        options: &GenerateOptions,
    ) -> Result<GeneratedFile, FfireError> {
        codegen::generate_message(&self.schema, &self.analysis, language, message, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEVICES: &str = r#"
// Fleet telemetry.
package devices

type Fleet struct {
    Name    string   `json:"name"`
    Devices []Device `json:"devices"`
    Owner   *string  `json:"owner,omitempty"`
}

type Device struct {
    ID       int64     `json:"id"`
    Readings []float32 `json:"readings"`
    Active   bool      `json:"active"`
}
"#;

    #[test]
    fn pipeline() {
        let compiled = compile_schema(DEVICES).unwrap();
        assert_eq!(compiled.message_names().collect::<Vec<_>>(), ["Fleet"]);
        assert_eq!(compiled.sole_message(), Some("Fleet"));

        let device = &compiled.schema.structs[1];
        let order: Vec<&str> = device.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["ID", "Active", "Readings"]);

        let value = json!({
            "name": "n",
            "devices": [{ "id": 1, "readings": [0.5], "active": true }]
        });
        let bytes = compiled.convert_fixture("Fleet", &value).unwrap();
        assert_eq!(compiled.decode_to_json("Fleet", &bytes).unwrap(), value);
    }

    #[test]
    fn convert_fixture_validates_first() {
        let compiled = compile_schema(DEVICES).unwrap();
        let err = compiled
            .convert_fixture("Fleet", &json!({ "name": "n", "devices": [{ "id": 1, "readings": [1e300], "active": true }] }))
            .unwrap_err();
        assert!(
            matches!(&err, FfireError::DataConformance { path, .. } if path == "devices[0].readings[0]"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn errors_stop_the_pipeline() {
        assert!(matches!(compile_schema("package p\ntype A struct {}"), Err(FfireError::SchemaStructural(_))));
        assert!(matches!(compile_schema("package p\ntype a int32"), Err(FfireError::NoRootType)));
        assert!(matches!(
            compile_schema_file("/nonexistent/schema.go"),
            Err(FfireError::Io(_))
        ));
    }

    #[test]
    fn compiled_schemas_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledSchema>();
    }
}

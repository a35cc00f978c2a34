//! Shared contract for the code generation backends.
//!
//! A backend receives a [`GenContext`] holding a canonicalized schema, its
//! analysis and the selected messages, and returns the source of one file.
//! Everything a backend needs to agree with the others on (field order, which
//! arrays may be copied in bulk, struct emission order) is decided here.

use std::{collections::BTreeSet, fmt, str::FromStr};

use log::debug;

use crate::{
    analyzer::{Analysis, TypeInfo},
    error::FfireError,
    gen_cpp::CppBackend,
    gen_rust::RustBackend,
    types::{Message, Primitive, Schema, StructId, Type, TypeKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Rust, Language::Cpp];

    pub fn name(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Language::Rust),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            other => Err(format!("unknown language {:?}, expected one of: rust, cpp", other)),
        }
    }
}

/// Knobs shared by every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Overrides the schema's package name in the output.
    pub package:       Option<String>,
    /// Crate path generated Rust code imports the wire runtime from.
    pub runtime_crate: String,
    /// Copy numeric arrays as one block on little-endian targets.
    pub bulk_arrays:   bool,
    /// Derive serde traits on generated Rust structs.
    pub serde:         bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            package:       None,
            runtime_crate: "ffire".to_string(),
            bulk_arrays:   true,
            serde:         false,
        }
    }
}

/// How an array's elements are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayStrategy {
    /// One length prefix followed by a raw little-endian block.
    Bulk(Primitive),
    ElementWise,
}

/// Bulk copies apply to required numeric elements only.
pub fn array_strategy(element: &Type, bulk_enabled: bool) -> ArrayStrategy {
    match &element.kind {
        TypeKind::Primitive(primitive) if bulk_enabled && !element.optional && primitive.is_numeric() => {
            ArrayStrategy::Bulk(*primitive)
        }
        _ => ArrayStrategy::ElementWise,
    }
}

/// Structs reachable from `messages`, each listed after every struct it
/// contains.
pub fn reachable_structs(schema: &Schema, messages: &[&Message]) -> Vec<StructId> {
    fn visit(schema: &Schema, type_: &Type, seen: &mut BTreeSet<StructId>, order: &mut Vec<StructId>) {
        let Some(id) = type_.innermost_struct() else {
            return;
        };
        if !seen.insert(id) {
            return;
        }
        for field in &schema.struct_def(id).fields {
            visit(schema, &field.type_, seen, order);
        }
        order.push(id);
    }

    let mut seen = BTreeSet::new();
    let mut order = Vec::new();
    for message in messages {
        visit(schema, &message.type_, &mut seen, &mut order);
    }
    order
}

/// Everything a backend sees for one generation run.
pub struct GenContext<'a> {
    pub schema:   &'a Schema,
    pub analysis: &'a Analysis,
    pub options:  &'a GenerateOptions,
    pub messages: Vec<&'a Message>,
    /// Reachable structs in dependency order.
    pub structs:  Vec<StructId>,
}

impl<'a> GenContext<'a> {
    pub fn new(
        schema: &'a Schema,
        analysis: &'a Analysis,
        options: &'a GenerateOptions,
        messages: Vec<&'a Message>,
    ) -> GenContext<'a> {
        let structs = reachable_structs(schema, &messages);
        GenContext {
            schema,
            analysis,
            options,
            messages,
            structs,
        }
    }

    pub fn package(&self) -> &str {
        self.options.package.as_deref().unwrap_or(&self.schema.package)
    }

    pub fn type_info(&self, type_: &Type) -> TypeInfo {
        self.analysis.type_info(type_)
    }

    pub fn struct_info(&self, id: StructId) -> &TypeInfo {
        self.analysis.struct_info(id)
    }

    pub fn array_strategy(&self, element: &Type) -> ArrayStrategy {
        array_strategy(element, self.options.bulk_arrays)
    }

    /// Every primitive used by the selected messages.
    pub fn primitives(&self) -> BTreeSet<Primitive> {
        fn collect(type_: &Type, out: &mut BTreeSet<Primitive>) {
            match &type_.kind {
                TypeKind::Primitive(primitive) => {
                    out.insert(*primitive);
                }
                TypeKind::Array(element) => collect(element, out),
                TypeKind::Struct(_) => {}
            }
        }

        let mut out = BTreeSet::new();
        for message in &self.messages {
            collect(&message.type_, &mut out);
        }
        for id in &self.structs {
            for field in &self.schema.struct_def(*id).fields {
                collect(&field.type_, &mut out);
            }
        }
        out
    }
}

/// A target language.
pub trait Backend: Send + Sync {
    fn language(&self) -> Language;

    fn supports(&self, _primitive: Primitive) -> bool {
        true
    }

    fn file_name(&self, package: &str) -> String;

    fn emit(&self, ctx: &GenContext<'_>) -> Result<String, FfireError>;
}

pub fn backend(language: Language) -> &'static dyn Backend {
    match language {
        Language::Rust => &RustBackend,
        Language::Cpp => &CppBackend,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub language:  Language,
    pub file_name: String,
    pub source:    String,
}

/// Runs `backend` after checking it can represent every reachable type.
pub fn generate_with(backend: &dyn Backend, ctx: &GenContext<'_>) -> Result<GeneratedFile, FfireError> {
    if let Some(primitive) = ctx.primitives().into_iter().find(|p| !backend.supports(*p)) {
        return Err(FfireError::UnsupportedType {
            backend:   backend.language().name().to_string(),
            type_name: primitive.name().to_string(),
        });
    }

    let source = backend.emit(ctx)?;
    let file_name = backend.file_name(ctx.package());
    debug!(
        "generated {} ({} bytes, {} structs, {} messages)",
        file_name,
        source.len(),
        ctx.structs.len(),
        ctx.messages.len()
    );
    Ok(GeneratedFile {
        language: backend.language(),
        file_name,
        source,
    })
}

/// Generates code for every message in the schema.
pub fn generate(
    schema: &Schema,
    analysis: &Analysis,
    language: Language,
    options: &GenerateOptions,
) -> Result<GeneratedFile, FfireError> {
    let ctx = GenContext::new(schema, analysis, options, schema.messages.iter().collect());
    generate_with(backend(language), &ctx)
}

/// Generates code for a single message and the structs it reaches.
pub fn generate_message(
    schema: &Schema,
    analysis: &Analysis,
    language: Language,
    message: &str,
    options: &GenerateOptions,
) -> Result<GeneratedFile, FfireError> {
    let ctx = GenContext::new(schema, analysis, options, vec![schema.message(message)?]);
    generate_with(backend(language), &ctx)
}

/// Line buffer with indentation tracking.
#[derive(Debug, Clone)]
pub struct CodeWriter {
    lines:  Vec<String>,
    indent: usize,
    unit:   &'static str,
}

impl CodeWriter {
    pub fn new(unit: &'static str) -> CodeWriter {
        CodeWriter {
            lines: Vec::new(),
            indent: 0,
            unit,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", self.unit.repeat(self.indent), text));
        }
    }

    pub fn blank(&mut self) {
        if self.lines.last().is_some_and(|last| !last.is_empty()) {
            self.lines.push(String::new());
        }
    }

    /// Writes `text` and indents what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedents and writes `text`.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn finish(mut self) -> String {
        while self.lines.last().is_some_and(|last| last.is_empty()) {
            self.lines.pop();
        }
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_schema;

    const FLEET: &str = "package fleet
        type Fleet struct { Devices []Device; Origin Point }
        type Device struct { Readings []Reading; Where *Point; Tags []string }
        type Reading struct { At Point; Values []float32; Flags []bool; Maybe []*int32 }
        type Point struct { X, Y float32 }
        type Stats struct { Count int64 }";

    #[test]
    fn structs_come_after_their_dependencies() {
        let compiled = compile_schema(FLEET).unwrap();
        let schema = &compiled.schema;
        let fleet = schema.message("Fleet").unwrap();
        let names: Vec<&str> = reachable_structs(schema, &[fleet])
            .into_iter()
            .map(|id| schema.struct_def(id).name.as_str())
            .collect();
        assert_eq!(names, ["Point", "Reading", "Device", "Fleet"]);
    }

    #[test]
    fn bulk_only_for_required_numbers() {
        let int32 = Type::primitive(Primitive::Int32);
        assert_eq!(array_strategy(&int32, true), ArrayStrategy::Bulk(Primitive::Int32));
        assert_eq!(array_strategy(&int32, false), ArrayStrategy::ElementWise);
        assert_eq!(array_strategy(&int32.clone().into_optional(), true), ArrayStrategy::ElementWise);
        assert_eq!(array_strategy(&Type::primitive(Primitive::Bool), true), ArrayStrategy::ElementWise);
        assert_eq!(array_strategy(&Type::primitive(Primitive::String), true), ArrayStrategy::ElementWise);
    }

    struct NoFloats;

    impl Backend for NoFloats {
        fn language(&self) -> Language {
            Language::Cpp
        }

        fn supports(&self, primitive: Primitive) -> bool {
            !matches!(primitive, Primitive::Float32 | Primitive::Float64)
        }

        fn file_name(&self, package: &str) -> String {
            format!("{}.txt", package)
        }

        fn emit(&self, ctx: &GenContext<'_>) -> Result<String, FfireError> {
            Ok(ctx.messages.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(","))
        }
    }

    #[test]
    fn unsupported_primitives_are_rejected() {
        let compiled = compile_schema(FLEET).unwrap();
        let options = GenerateOptions::default();
        let schema = &compiled.schema;

        let all = GenContext::new(schema, &compiled.analysis, &options, schema.messages.iter().collect());
        let err = generate_with(&NoFloats, &all).unwrap_err();
        assert!(matches!(&err, FfireError::UnsupportedType { type_name, .. } if type_name == "float32"));
        assert_eq!(err.code(), "E028");

        let stats = GenContext::new(schema, &compiled.analysis, &options, vec![schema.message("Stats").unwrap()]);
        let file = generate_with(&NoFloats, &stats).unwrap();
        assert_eq!(file.file_name, "fleet.txt");
        assert_eq!(file.source, "Stats");
    }

    #[test]
    fn unknown_message() {
        let compiled = compile_schema(FLEET).unwrap();
        let err = generate_message(
            &compiled.schema,
            &compiled.analysis,
            Language::Rust,
            "Device",
            &GenerateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FfireError::MessageNotFound(name) if name == "Device"));
    }

    #[test]
    fn languages_parse() {
        assert_eq!("rust".parse::<Language>(), Ok(Language::Rust));
        assert_eq!("C++".parse::<Language>(), Ok(Language::Cpp));
        assert!("go".parse::<Language>().is_err());
    }

    #[test]
    fn writer_indents() {
        let mut w = CodeWriter::new("    ");
        w.open("fn f() {");
        w.line("x();");
        w.blank();
        w.blank();
        w.close("}");
        w.blank();
        assert_eq!(w.finish(), "fn f() {\n    x();\n\n}\n");
    }
}

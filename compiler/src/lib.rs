//! ffire-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for Go-style schema files,
//!  2) A schema validator (empty structs, duplicate fields, cycles, nesting depth)
//!     and a data validator for JSON values,
//!  3) Canonical field ordering and the layout analyzer (`TypeInfo`),
//!  4) A fixture converter (JSON → wire bytes) and a dynamic decoder (wire bytes → JSON),
//!  5) Code generation for Rust and C++ behind the `Backend` trait,
//!  6) Error types (`FfireError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod validator;
pub mod canonical;
pub mod analyzer;
pub mod fixture;
pub mod decode;
pub mod naming;
pub mod codegen;
pub mod gen_rust;
pub mod gen_cpp;
pub mod compiler;

pub use analyzer::{Analysis, TypeInfo};
pub use codegen::{GeneratedFile, GenerateOptions, Language};
pub use compiler::{compile_schema, compile_schema_file, CompiledSchema};
pub use error::FfireError;
pub use types::Schema;

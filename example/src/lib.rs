// Rust code generated from schema/*.ffi by build.rs.
include!(concat!(env!("OUT_DIR"), "/telemetry.rs"));
include!(concat!(env!("OUT_DIR"), "/shapes.rs"));

pub use telemetry::*;

/// The schemas the generated code was built from, for tools that need to
/// compile them at runtime (fixture conversion, JSON decoding).
pub const SCHEMA: &str = include_str!("../schema/telemetry.ffi");
pub const SHAPES_SCHEMA: &str = include_str!("../schema/shapes.ffi");

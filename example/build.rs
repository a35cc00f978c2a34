use std::{env, error::Error, fs, path::PathBuf};

use ffire_compiler::{compile_schema_file, GenerateOptions, Language};

const SCHEMAS: [&str; 2] = ["schema/telemetry.ffi", "schema/shapes.ffi"];

fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let options = GenerateOptions {
        serde: true,
        ..GenerateOptions::default()
    };

    for schema in SCHEMAS {
        println!("cargo:rerun-if-changed={}", schema);

        let compiled = compile_schema_file(schema)?;
        let file = compiled.generate(Language::Rust, &options)?;
        fs::write(out_dir.join(&file.file_name), file.source)?;
    }
    Ok(())
}

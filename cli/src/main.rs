use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use log::{debug, info};
use rayon::prelude::*;
use simplelog::{ColorChoice, Config as SimpleLogConfig, LevelFilter, TermLogger, TerminalMode};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use ffire::{compile_schema_file, CompiledSchema, FfireError, GenerateOptions, Language};

#[derive(Parser)]
#[command(name = "ffire")]
#[command(about = "Validate schemas, convert fixtures, decode buffers or generate code for the ffire wire format", long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log nothing, not even warnings
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a schema, and optionally a JSON document against one of its messages
    Validate {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON data to check
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Message the data should conform to (defaults to the only message)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Encode a JSON fixture as wire bytes
    Fixture {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON fixture
        #[arg(short, long)]
        data: PathBuf,

        /// Message to encode (defaults to the only message)
        #[arg(short, long)]
        message: Option<String>,

        /// Output file (defaults to the fixture path with a `.bin` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate encoder/decoder source code
    Generate {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Target language, repeatable: rust, cpp
        #[arg(short, long = "lang", required = true)]
        langs: Vec<Language>,

        /// Directory the generated files are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Package name to use instead of the schema's
        #[arg(short, long)]
        package: Option<String>,

        /// Only generate this message and the types it uses
        #[arg(short, long)]
        message: Option<String>,

        /// Derive serde traits on generated Rust structs
        #[arg(long)]
        serde: bool,

        /// Encode numeric arrays element by element
        #[arg(long)]
        no_bulk: bool,

        /// Crate path generated Rust code imports the runtime from
        #[arg(long, default_value = "ffire")]
        runtime_crate: String,
    },

    /// Decode a wire buffer to JSON (printed to stdout)
    Decode {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Encoded input
        #[arg(short, long)]
        input: PathBuf,

        /// Message to decode (defaults to the only message)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the layout analysis of every type as JSON
    Analyze {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Off
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let _ = TermLogger::init(level, SimpleLogConfig::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

/// The named message, or the schema's only message. Exits with a usage error
/// when neither applies.
fn pick_message(compiled: &CompiledSchema, message: &Option<String>) -> String {
    if let Some(message) = message {
        return message.clone();
    }
    match compiled.sole_message() {
        Some(only) => only.to_string(),
        None => {
            let names: Vec<&str> = compiled.message_names().collect();
            Cli::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    format!("--message is required, the schema has several messages: {}", names.join(", ")),
                )
                .exit()
        }
    }
}

fn read_json(path: &PathBuf) -> Result<serde_json::Value, FfireError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn main() -> Result<(), FfireError> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Validate { schema, data, message } => {
            let compiled = compile_schema_file(schema)?;
            println!(
                "Schema {} is valid (package {}, messages: {})",
                schema.display(),
                compiled.schema.package,
                compiled.message_names().collect::<Vec<_>>().join(", ")
            );
            if let Some(data) = data {
                let message = pick_message(&compiled, message);
                let value = read_json(data)?;
                compiled.validate_data(&message, &value)?;
                println!("{} is a valid {}", data.display(), message);
            }
            Ok(())
        }

        Commands::Fixture { schema, data, message, output } => {
            let compiled = compile_schema_file(schema)?;
            let message = pick_message(&compiled, message);
            let value = read_json(data)?;
            let bytes = compiled.convert_fixture(&message, &value)?;

            let out_path = if let Some(o) = output {
                o.clone()
            } else {
                data.with_extension("bin")
            };
            fs::write(&out_path, &bytes)?;
            println!("Encoded {} → {} ({} bytes)", data.display(), out_path.display(), bytes.len());
            Ok(())
        }

        Commands::Generate {
            schema,
            langs,
            output_dir,
            package,
            message,
            serde,
            no_bulk,
            runtime_crate,
        } => {
            let compiled = compile_schema_file(schema)?;
            let options = GenerateOptions {
                package:       package.clone(),
                runtime_crate: runtime_crate.clone(),
                bulk_arrays:   !no_bulk,
                serde:         *serde,
            };
            debug!("generating {:?} with {:?}", langs, options);

            let files = langs
                .par_iter()
                .map(|lang| match message {
                    Some(message) => compiled.generate_message(*lang, message, &options),
                    None => compiled.generate(*lang, &options),
                })
                .collect::<Result<Vec<_>, FfireError>>()?;

            fs::create_dir_all(output_dir)?;
            for file in files {
                let out_path = output_dir.join(&file.file_name);
                fs::write(&out_path, &file.source)?;
                info!("wrote {} source ({} bytes)", file.language, file.source.len());
                println!("Generated {} code written to {}", file.language, out_path.display());
            }
            Ok(())
        }

        Commands::Decode { schema, input, message } => {
            let compiled = compile_schema_file(schema)?;
            let message = pick_message(&compiled, message);
            let data = fs::read(input)?;
            let value = compiled.decode_to_json(&message, &data)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }

        Commands::Analyze { schema } => {
            let compiled = compile_schema_file(schema)?;
            let structs: BTreeMap<&str, _> = compiled
                .schema
                .structs
                .iter()
                .zip(&compiled.analysis.structs)
                .map(|(def, info)| (def.name.as_str(), info))
                .collect();
            let report = serde_json::json!({
                "package": compiled.schema.package,
                "structs": structs,
                "declarations": compiled.analysis.declarations,
                "messages": compiled.analysis.messages,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_languages() {
        let cli = Cli::try_parse_from([
            "ffire", "-vv", "generate", "--schema", "s.go", "--lang", "rust", "--lang", "cpp", "--no-bulk",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Generate { langs, no_bulk, runtime_crate, .. } => {
                assert_eq!(langs, [Language::Rust, Language::Cpp]);
                assert!(no_bulk);
                assert_eq!(runtime_crate, "ffire");
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn rejects_unknown_languages() {
        assert!(Cli::try_parse_from(["ffire", "generate", "-s", "s.go", "-l", "go"]).is_err());
    }
}

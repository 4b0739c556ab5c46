//! oapi-compose CLI
//!
//! Command-line interface for composing `$ref`s in OpenAPI documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use oapi_compose::{ComposeOptions, Document};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oapi-compose")]
#[command(about = "Inline local and remote $ref targets of OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a document, replacing every resolvable $ref with its target
    Compose {
        /// Source document: file path or URL (http:// or https://)
        #[arg(long, short = 'i')]
        source: String,

        /// Output file (stdout if not specified)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output format (default: from the output file extension, else yaml)
        #[arg(long, value_enum)]
        format: Option<Format>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Only inline parameters, responses and path items; keep schema $refs
        #[arg(long)]
        skip_schemas: bool,

        /// Write circular $refs as absolute URIs
        #[arg(long)]
        absolute_circular_ref: bool,

        /// Report unresolvable $refs as warnings and keep going
        #[arg(long)]
        continue_on_error: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn for_output(output: Option<&Path>) -> Self {
        let extension = output
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compose {
            source,
            output,
            format,
            pretty,
            skip_schemas,
            absolute_circular_ref,
            continue_on_error,
        } => {
            let options = ComposeOptions::default()
                .skip_schemas(skip_schemas)
                .absolute_circular_ref(absolute_circular_ref)
                .continue_on_error(continue_on_error);
            let format = format.unwrap_or_else(|| Format::for_output(output.as_deref()));
            run_compose(&source, output.as_deref(), format, pretty, &options)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_compose(
    source: &str,
    output: Option<&Path>,
    format: Format,
    pretty: bool,
    options: &ComposeOptions,
) -> Result<(), u8> {
    let document = Document::load(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let composed = document.compose(options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if let Some(report) = composed.report() {
        for error in &report.errors {
            eprintln!("Warning: {}", error);
        }
    }

    let rendered = match format {
        Format::Json => composed.to_json(pretty),
        Format::Yaml => composed.to_yaml(),
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        e.exit_code() as u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(path, &rendered).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }

    Ok(())
}

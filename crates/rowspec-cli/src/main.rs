//! # rowspec-cli
//!
//! Command-line interface for rowspec.
//!
//! Loads declaration documents into a catalog and runs identifier parsing,
//! declaration inspection, column schema compliance checks, and record
//! construction against it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rowspec_catalog::Catalog;
use rowspec_schema::DeclarationLoader;
use rowspec_types::{ColumnSchema, SchemaVersion, Value, parse_identifier};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code when a column schema or row is rejected
const EXIT_REJECTED: u8 = 1;
/// Exit code when the command itself fails
const EXIT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "rowspec")]
#[command(about = "Versioned row schema declarations and compliance checks")]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a qualified identifier such as `child@2>parent@1`
    ParseId {
        /// Identifier to parse
        identifier: String,
    },

    /// Show declared schema versions as JSON
    Show {
        /// Declaration documents, loaded in order
        #[arg(short, long, required = true)]
        declarations: Vec<PathBuf>,

        /// Schema version to show (e.g., example.foo@1); all if omitted
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Check a column schema file against a schema version
    Validate {
        /// Declaration documents, loaded in order
        #[arg(short, long, required = true)]
        declarations: Vec<PathBuf>,

        /// Schema version to check against
        #[arg(short, long)]
        schema: String,

        /// Column schema file (JSON or YAML)
        #[arg(short, long)]
        columns: PathBuf,

        /// Report every violation instead of the first
        #[arg(short, long)]
        all: bool,
    },

    /// Construct a record from a JSON row and print it
    Construct {
        /// Declaration documents, loaded in order
        #[arg(short, long, required = true)]
        declarations: Vec<PathBuf>,

        /// Schema version of the record
        #[arg(short, long)]
        schema: String,

        /// JSON object with one entry per field
        #[arg(short, long)]
        row: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::ParseId { identifier } => {
            let chain = parse_identifier(&identifier)?;
            for (depth, sv) in chain.iter().enumerate() {
                println!("{depth}: {} version {}", sv.name(), sv.version());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { declarations, schema } => {
            let catalog = load_catalog(&declarations)?;
            let versions = match schema {
                Some(schema) => vec![schema.parse::<SchemaVersion>()?],
                None => catalog.schema_versions()?,
            };
            let summaries = versions
                .iter()
                .map(|sv| -> anyhow::Result<_> { Ok(catalog.lookup(sv)?.summary()) })
                .collect::<anyhow::Result<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            declarations,
            schema,
            columns,
            all,
        } => {
            let catalog = load_catalog(&declarations)?;
            let sv: SchemaVersion = schema.parse()?;
            let columns = load_columns(&columns)?;
            tracing::info!("Validating {} columns against {}", columns.len(), sv);

            let violations = if all {
                catalog.find_violations(&columns, &sv)?
            } else {
                catalog.find_violation(&columns, &sv)?.into_iter().collect()
            };

            if violations.is_empty() {
                println!("{sv}: compliant");
                return Ok(ExitCode::SUCCESS);
            }
            println!("{sv}: {} violation(s)", violations.len());
            for violation in &violations {
                println!("  - {violation}");
            }
            Ok(ExitCode::from(EXIT_REJECTED))
        }
        Commands::Construct {
            declarations,
            schema,
            row,
        } => {
            let catalog = load_catalog(&declarations)?;
            let sv: SchemaVersion = schema.parse()?;
            let row = load_row(&row)?;

            match catalog.construct_from(&sv, &row) {
                Ok(record) => {
                    println!("{}", serde_json::to_string_pretty(&record.to_json())?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) if err.construction().is_some() => {
                    println!("Rejected: {err}");
                    Ok(ExitCode::from(EXIT_REJECTED))
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

fn load_catalog(paths: &[PathBuf]) -> anyhow::Result<Catalog> {
    let catalog = Catalog::new();
    let loader = DeclarationLoader::default();
    for path in paths {
        let document = loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load declarations from {}", path.display()))?;
        let declared = catalog
            .load_document(&document)
            .with_context(|| format!("Failed to declare schemas from {}", path.display()))?;
        tracing::debug!("Declared {} schema versions from {}", declared.len(), path.display());
    }
    Ok(catalog)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn load_columns(path: &Path) -> anyhow::Result<ColumnSchema> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read column schema {}", path.display()))?;
    let columns: ColumnSchema = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(columns)
}

fn load_row(path: &Path) -> anyhow::Result<HashMap<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read row {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    let serde_json::Value::Object(object) = json else {
        anyhow::bail!("Row file {} must hold a JSON object", path.display());
    };
    object
        .iter()
        .map(|(name, value)| -> anyhow::Result<(String, Value)> {
            Ok((name.clone(), Value::from_json(value)?))
        })
        .collect()
}

//! termlens - dictionary-based text annotation
//!
//! Loads every `<name>.tsv` dictionary from a directory, brings stale
//! indexes up to date, runs one JSON request and prints the JSON response.
//!
//! ## Usage
//!
//! ```bash
//! termlens --dictionaries ./dicts annotate request.json
//! echo '{"terms": ["aspirin"]}' | termlens lookup
//! termlens --index-dir ./index compile drugs genes
//! ```
//!
//! ## Configuration
//!
//! Environment variables (flags take precedence):
//! - `TERMLENS_DICTIONARIES_DIR`: dictionary directory (default: dictionaries)
//! - `TERMLENS_INDEX_DIR`: index artifact directory (default: none)
//! - `TERMLENS_THRESHOLD`, `TERMLENS_MIN_TOKENS`, `TERMLENS_MAX_TOKENS`:
//!   request defaults
//! - `TERMLENS_TIMEOUT_MS`: annotate timeout (default: 30000)
//! - `TERMLENS_PARTIAL_DEGRADATION`: skip spans that fail to normalize
//! - `RUST_LOG`: logging filter (default: info)

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use termlens_annotate::{
    load_dictionaries, logging, AnnotateService, AnnotatorConfig, FindLabelsRequest,
    IdLookupRequest,
};
use termlens_core::BasicNormalizer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "termlens")]
#[command(about = "Annotate text with curated vocabularies")]
#[command(version)]
struct Cli {
    /// Directory of <name>.tsv dictionaries
    #[arg(long)]
    dictionaries: Option<PathBuf>,

    /// Directory for compiled index artifacts
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Default threshold for requests that omit one
    #[arg(long)]
    threshold: Option<f64>,

    /// Annotate timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate text: {"text": ..., "vocabularies": [...]}
    Annotate {
        /// Request file; stdin when omitted
        input: Option<PathBuf>,
    },
    /// Look up terms: {"terms": [...], "dictionaries": [...]}
    Lookup { input: Option<PathBuf> },
    /// Labels for identifiers: {"ids": [...], "dictionaries": [...]}
    Labels { input: Option<PathBuf> },
    /// Compile the named vocabularies, or all of them
    Compile { names: Vec<String> },
    /// Entry counts, index hashes and query figures
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_with_filter(&cli.log_level);

    let mut config = AnnotatorConfig::from_env()?;
    if let Some(dir) = cli.dictionaries {
        config.dictionaries_dir = dir;
    }
    if let Some(dir) = cli.index_dir {
        config.index_dir = Some(dir);
    }
    if cli.threshold.is_some() {
        config.threshold = cli.threshold;
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout_ms = ms;
    }
    config.validate()?;

    let normalizer = Arc::new(BasicNormalizer::new());
    let registry = load_dictionaries(&config, normalizer.as_ref())?;
    let service = AnnotateService::new(registry, normalizer, config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        vocabularies = service.registry().len(),
        "termlens ready"
    );

    match cli.command {
        Command::Annotate { input } => {
            service.compile_stale();
            let response = service.annotate(read_request(input)?).await?;
            print_json(&response)?;
        }
        Command::Lookup { input } => {
            service.compile_stale();
            let request: IdLookupRequest = read_request(input)?;
            print_json(&service.lookup_ids(&request)?)?;
        }
        Command::Labels { input } => {
            let request: FindLabelsRequest = read_request(input)?;
            print_json(&service.find_labels(&request)?)?;
        }
        Command::Compile { names } => {
            let statuses = if names.is_empty() {
                service.compile_all()
            } else {
                names
                    .iter()
                    .map(|name| service.compile(name))
                    .collect::<Result<Vec<_>, _>>()?
            };
            print_json(&statuses)?;
        }
        Command::Stats => print_json(&service.stats()?)?,
    }
    Ok(())
}

fn read_request<T: DeserializeOwned>(input: Option<PathBuf>) -> Result<T, Box<dyn std::error::Error>> {
    let json = match input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&json)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

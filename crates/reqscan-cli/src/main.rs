//! reqscan - OCR extraction from the command line
//!
//! Usage:
//!   reqscan extract scan.png               Print the recognized text
//!   reqscan extract reqs.pdf --format json Print text, pages and partial-failure info
//!   reqscan cache stats                    Show cache size
//!   reqscan cache sweep                    Drop expired cache entries
//!
//! Exit codes: 0 on success, 1 for input and configuration errors, 2 when recognition
//! failed or (with `--strict`) some pages were lost. Rerunning may help in the latter case.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqscan::ocr::OcrCache;
use reqscan::{ExtractionError, ExtractionRequest, Pipeline, ReqscanConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_RETRYABLE: u8 = 2;

#[derive(Parser)]
#[command(name = "reqscan")]
#[command(about = "Resilient OCR extraction for scanned requirement documents")]
#[command(version)]
struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json); defaults to a discovered reqscan.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log pipeline events at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text from an image (png, jpg, jpeg) or a PDF
    Extract {
        path: PathBuf,

        /// Full recognition attempts before the degraded pass
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,

        /// Neither read nor write the result cache
        #[arg(long)]
        no_cache: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Fail when any page of a document could not be recognized
        #[arg(long)]
        strict: bool,
    },

    /// Inspect or maintain the result cache
    Cache {
        /// Cache directory (overrides the configured one)
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print entry count and size as JSON
    Stats,
    /// Remove expired entries
    Sweep,
    /// Remove every entry
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<ExtractionError>() {
                Some(extraction_err) if extraction_err.is_retryable() => ExitCode::from(EXIT_RETRYABLE),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "reqscan=debug" } else { "reqscan=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ReqscanConfig> {
    let config = match path {
        Some(path) => ReqscanConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ReqscanConfig::discover()
            .context("Failed to discover reqscan.toml")?
            .unwrap_or_default(),
    };
    Ok(config)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Extract {
            path,
            max_retries,
            no_cache,
            format,
            strict,
        } => {
            if no_cache {
                config.cache.enabled = false;
            }
            if let Some(max_retries) = max_retries {
                config.ocr.max_retries = max_retries;
            }
            extract(&path, &config, format, strict)
        }
        Command::Cache { dir, action } => {
            if dir.is_some() {
                config.cache.dir = dir;
            }
            cache(&config, action)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn extract(path: &Path, config: &ReqscanConfig, format: OutputFormat, strict: bool) -> Result<ExitCode> {
    let request = ExtractionRequest::new(path)?.with_max_retries(config.ocr.max_retries);
    let pipeline = Pipeline::from_config(config)?;
    let extraction = pipeline.extract(&request)?;

    if let Some(partial) = &extraction.partial_failure {
        tracing::warn!("{}", partial);
    }
    let partial = extraction.is_partial();

    match format {
        OutputFormat::Text => println!("{}", extraction.text),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&extraction)?),
    }

    if strict && partial {
        return Ok(ExitCode::from(EXIT_RETRYABLE));
    }
    Ok(ExitCode::SUCCESS)
}

fn cache(config: &ReqscanConfig, action: CacheAction) -> Result<()> {
    let cache = OcrCache::from_config(&config.cache)?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheAction::Sweep => {
            let removed = cache.sweep_expired();
            println!("Removed {} expired entries from {}", removed, cache.cache_dir().display());
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("Removed {} entries from {}", removed, cache.cache_dir().display());
        }
    }
    Ok(())
}

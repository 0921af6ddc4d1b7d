//! CLI entry point for the bike-share ETL pipeline.
//!
//! Provides subcommands for processing the monthly trip archives into a
//! cleaned table, running the rider-behaviour analysis on it, or both.

use anyhow::Result;
use bikeshare_etl::{
    acquire::{ArchiveAcquirer, source_name},
    config::PipelineConfig,
    error::PipelineError,
    fetch::BasicClient,
    pipeline::{process_and_save, run_analysis},
};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_etl")]
#[command(about = "ETL and rider-behaviour analysis for bike-share trip data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, integrate, clean and transform the trip archives
    Process {
        /// JSON config file; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Archive URL or local path, overriding the configured sources (repeatable)
        #[arg(short, long = "source", value_name = "URL_OR_PATH")]
        sources: Vec<String>,

        /// Gzip-compress the cleaned table
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Run the five analysis reports on a cleaned table
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cleaned table to analyze; defaults to the one in the processed directory
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Process then analyze
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Print the configured sources
    ListSources {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bikeshare_etl.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_etl.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            config,
            sources,
            gzip,
        } => {
            let mut config = load_config(config.as_deref())?;
            if !sources.is_empty() {
                config.sources = sources;
            }
            process(&config, gzip).await?;
        }
        Commands::Analyze { config, input } => {
            let config = load_config(config.as_deref())?;
            let input = input.unwrap_or_else(|| default_input(&config));
            analyze(&config, &input)?;
        }
        Commands::Run { config, gzip } => {
            let config = load_config(config.as_deref())?;
            process(&config, gzip).await?;
            analyze(&config, &config.cleaned_data_path(gzip))?;
        }
        Commands::ListSources { config } => {
            let config = load_config(config.as_deref())?;
            for source in &config.sources {
                info!(name = %source_name(source), source = %source, "Source");
            }
            info!(total = config.sources.len(), "Source list summary");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };
    Ok(config)
}

/// The plain cleaned table if present, otherwise the gzip one.
fn default_input(config: &PipelineConfig) -> PathBuf {
    let plain = config.cleaned_data_path(false);
    let gzip = config.cleaned_data_path(true);
    if !plain.exists() && gzip.exists() {
        gzip
    } else {
        plain
    }
}

#[tracing::instrument(skip_all, fields(gzip = gzip))]
async fn process(config: &PipelineConfig, gzip: bool) -> Result<()> {
    let acquirer = ArchiveAcquirer::new(BasicClient::new());
    let (_, report) = process_and_save(&acquirer, config, gzip).await?;

    if !report.integration.files_with_errors.is_empty() {
        warn!(
            failed = ?report.integration.files_with_errors,
            "Some sources could not be processed"
        );
    }
    Ok(())
}

fn analyze(config: &PipelineConfig, input: &Path) -> Result<()> {
    match run_analysis(config, input) {
        Ok(outcomes) => {
            for failed in outcomes.iter().filter(|o| !o.succeeded()) {
                warn!(report = failed.name, "Report was not produced");
            }
            Ok(())
        }
        Err(e @ (PipelineError::NotFound(_) | PipelineError::EmptyInput(_))) => {
            error!(error = %e, "Nothing to analyze, run `process` first");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

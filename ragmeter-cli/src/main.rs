//! ragmeter CLI: score retrieval-augmented generation outputs from the terminal.

mod commands;
mod output;

use clap::Parser;
use ragmeter_ingest::DataKind;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// ragmeter: evaluate RAG answers for faithfulness, precision and relevance
#[derive(Parser, Debug)]
#[command(name = "ragmeter", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .ragmeter/config.toml)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Evaluate every example in a dataset file
    Evaluate(EvaluateArgs),
    /// Score a single example given on the command line
    Score {
        /// The question that was asked
        #[arg(long)]
        query: String,
        /// Retrieved context the answer was generated from
        #[arg(long)]
        context: String,
        /// The generated answer
        #[arg(long)]
        answer: String,
        /// Reference answer, enables context precision
        #[arg(long)]
        ground_truth: Option<String>,
        /// Scoring backend
        #[arg(long, value_enum, default_value_t = BackendKind::Heuristic)]
        backend: BackendKind,
    },
    /// List registered metric names
    Metrics,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct EvaluateArgs {
    /// Dataset file (.csv, .xlsx, .xls, .json, .bib or .bibtex)
    file: PathBuf,

    /// Input format: auto, csv, json, excel or bibtex
    #[arg(long, default_value = "auto")]
    format: DataKind,

    /// Comma-separated metric names (default: all)
    #[arg(long, value_delimiter = ',')]
    metrics: Option<Vec<String>>,

    /// Ignore unknown metric names instead of failing
    #[arg(long)]
    lenient_metrics: bool,

    /// Scoring backend
    #[arg(long, value_enum, default_value_t = BackendKind::Heuristic)]
    backend: BackendKind,

    /// Score examples on all cores (heuristic backend only)
    #[arg(long)]
    parallel: bool,

    /// Write results as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print per-metric reasoning for every example
    #[arg(long)]
    details: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    /// Term-overlap metrics, no network access
    Heuristic,
    /// LLM judge (requires judge.enabled in configuration)
    Judge,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file to the workspace
    Init,
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "ragmeter", "ragmeter")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ragmeter.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}

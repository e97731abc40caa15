//! vizreg CLI - Main Entry Point
//!
//! Exit codes: 0 when every case matched, 1 when a case did not match,
//! 2 on errors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use vizreg_cli::commands::{init, reference, regression, results, CaseArgs};
use vizreg_cli::output::{self, OutputFormat};
use vizreg_common::{Browser, Settings};

/// vizreg - screenshot a page and compare it against its reference
#[derive(Parser)]
#[command(name = "vizreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (defaults to ./vizreg.toml when present)
    #[arg(long, global = true, env = "VIZREG_CONFIG")]
    config: Option<PathBuf>,

    /// Browser engine for captures (chromium, firefox, webkit), overriding the settings file
    #[arg(long, global = true, env = "VIZREG_BROWSER")]
    browser: Option<Browser>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Log format
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture pages and compare them against their references
    Regression(CaseArgs),

    /// Capture pages and make the captures their new references
    Reference(CaseArgs),

    /// List recorded results
    Results(results::ResultsArgs),

    /// Write the effective settings to vizreg.toml
    Init(init::InitArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = effective_settings(&cli)?;
    tracing::debug!(
        "Settings from {} (browser: {})",
        settings.from,
        settings.capture.browser.as_str()
    );

    match cli.command {
        Commands::Regression(args) => regression::execute(args, settings, cli.format).await,
        Commands::Reference(args) => reference::execute(args, settings, cli.format).await,
        Commands::Results(args) => results::execute(args, settings, cli.format).await,
        Commands::Init(args) => init::execute(args, settings),
    }
}

/// Settings from `--config` or discovery, with command-line overrides applied
fn effective_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::discover(),
    };
    if let Some(browser) = cli.browser {
        settings.capture.browser = browser;
    }
    Ok(settings)
}

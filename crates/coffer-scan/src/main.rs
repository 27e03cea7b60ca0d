//! Coffer enforcement scanner CLI.
//!
//! Exits non-zero when any data-access entry point lacks an attached
//! permission requirement, so a plain `coffer-scan check` wired into CI
//! fails the build on the first unenforced operation.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use coffer_scan::{ScanResult, Scanner};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "coffer-scan")]
#[command(version, about = "Verify every data-access entry point declares a permission requirement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a workspace and report unenforced entry points
    Check {
        /// Workspace root (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialized");
    }

    match cli.command {
        Commands::Check { path, format } => match run_check(path, format) {
            Ok(result) if result.has_violations() => ExitCode::FAILURE,
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_check(path: PathBuf, format: Format) -> Result<ScanResult> {
    let root = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("failed to resolve current directory")?
            .join(path)
    };

    let result = Scanner::new(root).scan().context("enforcement scan failed")?;

    match format {
        Format::Text => result.print_report(),
        Format::Json => {
            let report = serde_json::to_string_pretty(&result)
                .context("failed to serialize scan report")?;
            println!("{report}");
        }
    }

    Ok(result)
}

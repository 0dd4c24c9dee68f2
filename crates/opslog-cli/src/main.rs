//! Ops Logging CLI
//!
//! Thin wrapper around opslog-core for working with captured failures stored
//! as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Print the fingerprint of a failure
//! opslog fingerprint failure.json
//!
//! # Print the full trace
//! opslog render failure.json
//!
//! # Archive the trace once and print the substitute message
//! opslog process failure.json --dir /var/log/app/traces
//!
//! # Without a directory (flag, config file or OPSLOG_STACKTRACE_DIR) the trace is printed inline
//! opslog process failure.json
//!
//! # Read the failure from stdin
//! cat failure.json | opslog process - --dir ./traces --create-dir
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opslog_core::{
    trace_string, Failure, FingerprintAlgorithm, ProcessorConfig, StackTraceProcessor,
};
use tracing::{debug, info};

/// Ops Logging - stack trace deduplication
#[derive(Parser)]
#[command(name = "opslog")]
#[command(version = "0.1.0")]
#[command(about = "Ops Logging - fingerprint, render and archive captured failures")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content fingerprint of a failure
    Fingerprint {
        /// Failure JSON file ("-" for stdin)
        input: String,

        /// Fingerprint algorithm: blake3 or sha256
        #[arg(short, long)]
        algorithm: Option<FingerprintAlgorithm>,
    },

    /// Print the full multi-line trace of a failure
    Render {
        /// Failure JSON file ("-" for stdin)
        input: String,
    },

    /// Process a failure the way the logger does and print the result
    Process {
        /// Failure JSON file ("-" for stdin)
        input: String,

        /// Archive directory (overrides config and OPSLOG_STACKTRACE_DIR)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Create the archive directory if missing
        #[arg(long)]
        create_dir: bool,

        /// Fingerprint algorithm: blake3 or sha256
        #[arg(short, long)]
        algorithm: Option<FingerprintAlgorithm>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Read a failure from a JSON file, or stdin for "-"
fn read_failure(input: &str) -> Result<Failure> {
    let json = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read failure from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read failure file '{}'", input))?
    };

    serde_json::from_str(&json).with_context(|| format!("Invalid failure JSON in '{}'", input))
}

/// Config file (or defaults), then environment, then command-line flags
fn resolve_config(
    config: Option<PathBuf>,
    dir: Option<PathBuf>,
    create_dir: bool,
    algorithm: Option<FingerprintAlgorithm>,
) -> Result<ProcessorConfig> {
    let mut resolved = match config {
        Some(path) => ProcessorConfig::load(&path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => ProcessorConfig::default(),
    }
    .with_env()?;

    if dir.is_some() {
        resolved.stacktrace_dir = dir;
    }
    if let Some(algorithm) = algorithm {
        resolved.fingerprint = algorithm;
    }
    resolved.create_dir |= create_dir;

    Ok(resolved)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Fingerprint { input, algorithm } => {
            let failure = read_failure(&input)?;
            let calculator = algorithm.unwrap_or_default().calculator();
            println!("{}", calculator.fingerprint(&failure));
        }

        Commands::Render { input } => {
            let failure = read_failure(&input)?;
            println!("{}", trace_string(&failure));
        }

        Commands::Process {
            input,
            dir,
            create_dir,
            algorithm,
            config,
        } => {
            let failure = read_failure(&input)?;
            let config = resolve_config(config, dir, create_dir, algorithm)?;
            debug!(?config, "Resolved processor configuration");

            let processor = config.build()?;
            let mut output = String::new();
            match &processor {
                StackTraceProcessor::Filesystem(archiver) => {
                    let archived = archiver.process(&failure, &mut output)?;
                    info!(path = ?archived.path, outcome = ?archived.outcome, "Stack trace archived");
                }
                StackTraceProcessor::Inline => processor.process(&failure, &mut output)?,
            }
            println!("{}", output);
        }
    }

    Ok(())
}

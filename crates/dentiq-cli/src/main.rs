//! Dentiq CLI - Command-line tool for the imaging-diagnostics partner API
//!
//! Uploads imaging studies through the partner's multi-stage pipeline and
//! tracks the resulting analyses.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dentiq_client::{DentiqClient, DentiqConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "dentiq-cli")]
#[command(author, version, about = "Dentiq imaging-diagnostics CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Partner API base URL
    #[arg(short, long, env = "DENTIQ_API_URL")]
    server: Option<String>,

    /// Static API key (takes priority over email/password)
    #[arg(long, env = "DENTIQ_API_KEY")]
    api_key: Option<String>,

    /// Account email, used with --password when no API key is set
    #[arg(long, env = "DENTIQ_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "DENTIQ_PASSWORD")]
    password: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "DENTIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an imaging study and request an analysis
    Upload {
        /// Remote patient identifier
        patient: String,

        /// Path to the study payload (e.g. a DICOM file)
        file: PathBuf,
    },

    /// Check the status of an analysis
    Status {
        /// Report identifier returned by upload
        report: String,
    },

    /// Export a report with its diagnoses as JSON
    Export {
        /// Report identifier
        report: String,

        /// Write the export to a file instead of stdout
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Download a report PDF
    Pdf {
        /// Report identifier
        report: String,

        /// Destination path
        #[arg(short, long, default_value = "report.pdf")]
        out: PathBuf,
    },

    /// List all analyses for a patient
    Analyses {
        /// Remote patient identifier
        patient: String,
    },

    /// Check connectivity and credentials against the partner API
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args over config file values
    let merged = config.merge_with_args(&cli);

    // Create output context
    let ctx = OutputContext::new(cli.output, merged.no_color, cli.quiet);

    let client = create_client(&merged)?;

    // Execute command
    match &cli.command {
        Commands::Upload { patient, file } => {
            commands::upload(&client, patient, file, &ctx).await?;
        }

        Commands::Status { report } => {
            commands::status(&client, report, &ctx).await?;
        }

        Commands::Export { report, file } => {
            commands::export(&client, report, file.as_deref(), &ctx).await?;
        }

        Commands::Pdf { report, out } => {
            commands::pdf(&client, report, out, &ctx).await?;
        }

        Commands::Analyses { patient } => {
            commands::analyses(&client, patient, &ctx).await?;
        }

        Commands::Ping => {
            commands::ping(&client, &ctx).await?;
        }
    }

    Ok(())
}

/// Create a partner-API client from the merged configuration
fn create_client(merged: &config::MergedConfig) -> Result<DentiqClient> {
    let mut builder = DentiqConfig::builder(&merged.server);

    if let Some(key) = &merged.api_key {
        builder = builder.api_key(key);
    }
    if let (Some(email), Some(password)) = (&merged.email, &merged.password) {
        builder = builder.credentials(email, password);
    }

    DentiqClient::new(builder.build()).context("Failed to create partner-API client")
}

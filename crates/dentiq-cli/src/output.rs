//! Output formatting for dentiq-cli (table, json)

use clap::ValueEnum;
use colored::Colorize;
use dentiq_client::{Diagnosis, Report};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    Table,
    /// JSON format
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Table
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print an error message
    #[allow(dead_code)]
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }

    /// Print key-value pairs (for status-style commands)
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: std::collections::HashMap<&str, &str> =
                    pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Report display for the analyses command
#[derive(Debug, Tabled, Serialize)]
pub struct ReportRow {
    #[tabled(rename = "Report")]
    pub id: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Complete")]
    pub complete: String,
    #[tabled(rename = "PDF")]
    pub pdf: String,
}

impl From<&Report> for ReportRow {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id.clone(),
            status: report.status.clone(),
            complete: if report.is_complete() { "yes" } else { "no" }.to_string(),
            pdf: report.pdf_url.clone().unwrap_or_default(),
        }
    }
}

/// Diagnosis display for the status command
#[derive(Debug, Tabled, Serialize)]
pub struct DiagnosisRow {
    #[tabled(rename = "Tooth")]
    pub tooth: i32,
    #[tabled(rename = "Comment")]
    pub comment: String,
}

impl From<&Diagnosis> for DiagnosisRow {
    fn from(diagnosis: &Diagnosis) -> Self {
        Self {
            tooth: diagnosis.tooth_number,
            comment: diagnosis.text_comment.clone(),
        }
    }
}

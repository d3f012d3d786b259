//! Export command - report + diagnoses as JSON

use anyhow::{Context, Result};
use dentiq_client::DentiqClient;
use std::path::Path;

use crate::output::OutputContext;

/// Export a report with its diagnoses as a JSON document
pub async fn export(
    client: &DentiqClient,
    report_id: &str,
    file: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let export = client
        .export_report(report_id)
        .await
        .context("Failed to export report")?;

    let json = serde_json::to_string_pretty(&export).context("Failed to serialize export")?;

    match file {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            ctx.success(&format!("Export written to {}", path.display()));
        }
        None => println!("{}", json),
    }

    Ok(())
}

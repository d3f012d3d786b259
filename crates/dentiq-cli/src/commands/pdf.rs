//! Pdf command - report PDF download

use anyhow::{Context, Result};
use dentiq_client::DentiqClient;
use std::path::Path;

use crate::output::OutputContext;

/// Download a report PDF to a local path
pub async fn pdf(
    client: &DentiqClient,
    report_id: &str,
    out: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Downloading report {}...", report_id));

    client
        .download_pdf(report_id, out)
        .await
        .context("Failed to download report PDF")?;

    ctx.success(&format!("Report saved to {}", out.display()));
    Ok(())
}

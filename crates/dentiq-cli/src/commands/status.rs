//! Status command - analysis status check

use anyhow::{Context, Result};
use dentiq_client::DentiqClient;

use crate::output::{DiagnosisRow, OutputContext};

/// Check the status of an analysis
pub async fn status(client: &DentiqClient, report_id: &str, ctx: &OutputContext) -> Result<()> {
    let report = client
        .analysis_status(report_id)
        .await
        .context("Failed to fetch analysis status")?;

    ctx.print_kv(&[
        ("report_id", report.id.clone()),
        ("status", report.status.clone()),
        ("complete", report.is_complete().to_string()),
        ("pdf_url", report.pdf_url.clone().unwrap_or_default()),
        ("webpage_url", report.webpage_url.clone().unwrap_or_default()),
    ]);

    if let Some(diagnoses) = &report.diagnoses {
        ctx.info("");
        let rows: Vec<DiagnosisRow> = diagnoses.diagnoses.iter().map(Into::into).collect();
        ctx.print(&rows);
    }

    Ok(())
}

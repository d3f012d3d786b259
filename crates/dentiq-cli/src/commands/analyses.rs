//! Analyses command - list a patient's analyses

use anyhow::{Context, Result};
use dentiq_client::DentiqClient;

use crate::output::{OutputContext, ReportRow};

/// List all analyses recorded for a patient
pub async fn analyses(client: &DentiqClient, patient: &str, ctx: &OutputContext) -> Result<()> {
    let reports = client
        .list_analyses(patient)
        .await
        .context("Failed to list analyses")?;

    let rows: Vec<ReportRow> = reports.iter().map(Into::into).collect();
    ctx.print(&rows);

    Ok(())
}

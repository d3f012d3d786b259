//! Upload command - study upload and analysis request

use anyhow::{Context, Result};
use dentiq_client::{DentiqClient, UploadStage, UploadWorkflow};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::output::OutputContext;

/// Upload an imaging study and request an analysis
pub async fn upload(
    client: &DentiqClient,
    patient: &str,
    file: &Path,
    ctx: &OutputContext,
) -> Result<()> {
    let size = std::fs::metadata(file)
        .with_context(|| format!("Failed to read study file: {}", file.display()))?
        .len();

    ctx.info(&format!(
        "Uploading {} ({:.1} MB) for patient {}...",
        file.display(),
        size as f64 / 1024.0 / 1024.0,
        patient
    ));

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    // The workflow reports stage transitions plus transfer percentages;
    // map them onto one bar the way the stages spend wall-clock time.
    let bar = pb.clone();
    let progress = move |stage: UploadStage, pct: Option<f64>| {
        let pos = match stage {
            UploadStage::Created => 2,
            UploadStage::SessionOpen => 5,
            UploadStage::UrlsIssued => 8,
            // Transfer covers 10-70
            UploadStage::Uploading => 10 + (pct.unwrap_or(0.0) * 0.6) as u64,
            UploadStage::SessionClosing => 72,
            UploadStage::SessionClosed => 90,
            UploadStage::AnalysisRequested => 95,
            UploadStage::Done => 100,
        };
        bar.set_position(pos.min(100));
        bar.set_message(stage.to_string());
    };

    let result = UploadWorkflow::new(client)
        .run(patient, file, Some(progress))
        .await;

    match result {
        Ok(report_id) => {
            pb.finish_with_message("complete");
            ctx.success("\nUpload complete, analysis requested");
            ctx.print_kv(&[("report_id", report_id)]);
            Ok(())
        }
        Err(e) => {
            pb.finish_with_message("failed");
            Err(anyhow::Error::from(e).context("Upload workflow failed"))
        }
    }
}

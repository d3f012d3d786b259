//! Analysis status checks and report export
//!
//! On-demand queries against a report identifier obtained from the upload
//! workflow. Safe to repeat; nothing here mutates remote state.

use chrono::Utc;
use tracing::{instrument, warn};

use crate::client::DentiqClient;
use crate::error::Result;
use crate::types::{Report, ReportExport};

impl DentiqClient {
    /// Check the status of an analysis
    ///
    /// When the remote reports the analysis complete, the structured
    /// diagnoses are fetched in the same call. A diagnoses failure does
    /// not fail the status check; the field is simply left absent.
    #[instrument(skip(self))]
    pub async fn analysis_status(&self, report_id: &str) -> Result<Report> {
        let mut report = self.get_report(report_id).await?;

        if report.is_complete() {
            match self.get_diagnoses(report_id).await {
                Ok(diagnoses) => report.diagnoses = Some(diagnoses),
                Err(e) => {
                    warn!(report_id, error = %e, "Diagnoses fetch failed; omitting from status");
                }
            }
        }

        Ok(report)
    }

    /// Assemble a report export: the report plus its structured diagnoses
    /// and fetch provenance
    ///
    /// Unlike [`analysis_status`](Self::analysis_status), an export of a
    /// complete report requires the diagnoses; a failed fetch fails the
    /// export rather than silently producing a partial document.
    #[instrument(skip(self))]
    pub async fn export_report(&self, report_id: &str) -> Result<ReportExport> {
        let report = self.get_report(report_id).await?;

        let diagnoses = if report.is_complete() {
            Some(self.get_diagnoses(report_id).await?)
        } else {
            None
        };

        Ok(ReportExport {
            fetched_at: Utc::now(),
            source: self.base_url().to_string(),
            report_id: report_id.to_string(),
            report,
            diagnoses,
        })
    }
}

//! Service entry points for collaborators
//!
//! The HTTP layer that fronts this library wants to return immediately
//! after accepting a payload, so the workflow runs on a detached tokio
//! task. [`UploadService::spawn_upload`] makes that explicit: the task is
//! tracked by a handle, carries a cancellation token, and the caller's
//! completion handler is guaranteed to run exactly once on success,
//! failure, or cancellation. The handler is the usual place to mark the
//! associated business record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::client::DentiqClient;
use crate::error::Result;
use crate::types::{Report, ReportExport};
use crate::upload::{UploadError, UploadResult, UploadStage, UploadWorkflow};

/// High-level upload/status service over a shared client
#[derive(Debug, Clone)]
pub struct UploadService {
    client: Arc<DentiqClient>,
}

/// Handle to a detached upload task
///
/// Dropping the handle does not cancel the task; the workflow keeps
/// running and the completion handler still fires.
#[derive(Debug)]
pub struct UploadHandle {
    join: JoinHandle<()>,
    cancel: CancellationToken,
}

impl UploadHandle {
    /// Request cancellation of the running workflow
    ///
    /// The completion handler observes [`UploadError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task (including its completion handler) has finished
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait until the task and its completion handler have run
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

impl UploadService {
    /// Create a service over a shared client
    pub fn new(client: Arc<DentiqClient>) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &DentiqClient {
        &self.client
    }

    /// Run the full upload workflow inline and return the report identifier
    pub async fn upload_study(&self, patient_uid: &str, path: &Path) -> UploadResult {
        UploadWorkflow::new(&self.client)
            .run(patient_uid, path, None::<fn(UploadStage, Option<f64>)>)
            .await
    }

    /// Run the upload workflow on a detached task
    ///
    /// `on_complete` runs exactly once, on the task, whatever the outcome.
    /// Cancelling through the returned handle aborts the workflow at its
    /// next suspension point and reports [`UploadError::Cancelled`].
    pub fn spawn_upload<C>(
        &self,
        patient_uid: String,
        path: PathBuf,
        on_complete: C,
    ) -> UploadHandle
    where
        C: FnOnce(UploadResult) + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let workflow = UploadWorkflow::new(&client);
            let result = tokio::select! {
                _ = token.cancelled() => Err(UploadError::Cancelled),
                res = workflow.run(
                    &patient_uid,
                    &path,
                    None::<fn(UploadStage, Option<f64>)>,
                ) => res,
            };

            if let Err(e) = &result {
                error!(patient = %patient_uid, error = %e, "Upload workflow failed");
            }

            on_complete(result);
        });

        UploadHandle { join, cancel }
    }

    /// Check the status of a previously requested analysis
    pub async fn analysis_status(&self, report_id: &str) -> Result<Report> {
        self.client.analysis_status(report_id).await
    }

    /// Assemble a report export (report + diagnoses + provenance)
    pub async fn export_report(&self, report_id: &str) -> Result<ReportExport> {
        self.client.export_report(report_id).await
    }

    /// Download the report PDF to a destination path
    pub async fn download_pdf(&self, report_id: &str, dest: &Path) -> Result<()> {
        self.client.download_pdf(report_id, dest).await
    }
}

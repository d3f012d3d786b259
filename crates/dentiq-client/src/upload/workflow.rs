//! The upload state machine

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};

use crate::client::DentiqClient;
use crate::error::DentiqError;
use crate::transfer::{ProgressObserver, TransferProgress};
use crate::types::SessionState;

/// Stages of the upload workflow, in execution order
///
/// A failure in any stage aborts the remaining stages; the stage is
/// carried on the error so callers can tell where the pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    /// Creating the remote study container
    Created,
    /// Opening the upload session
    SessionOpen,
    /// Requesting pre-signed upload URLs
    UrlsIssued,
    /// Streaming the payload
    Uploading,
    /// Closing the session and waiting for server-side processing
    SessionClosing,
    /// Session processing finished
    SessionClosed,
    /// Requesting the analysis
    AnalysisRequested,
    /// Workflow finished; report identifier available
    Done,
}

impl std::fmt::Display for UploadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "study creation"),
            Self::SessionOpen => write!(f, "session open"),
            Self::UrlsIssued => write!(f, "upload-url request"),
            Self::Uploading => write!(f, "payload transfer"),
            Self::SessionClosing => write!(f, "session processing"),
            Self::SessionClosed => write!(f, "session closed"),
            Self::AnalysisRequested => write!(f, "analysis request"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Workflow failure, carrying the stage that aborted the pipeline
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A stage failed; no further stages ran
    #[error("upload failed during {stage}: {source}")]
    Stage {
        stage: UploadStage,
        #[source]
        source: DentiqError,
    },

    /// The workflow was cancelled before reaching a terminal stage
    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    fn at(stage: UploadStage) -> impl FnOnce(DentiqError) -> Self {
        move |source| Self::Stage { stage, source }
    }

    /// The stage the pipeline stopped in, if it failed in one
    pub fn stage(&self) -> Option<UploadStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Cancelled => None,
        }
    }
}

/// Result type for workflow runs
pub type UploadResult = std::result::Result<String, UploadError>;

/// The upload orchestrator
///
/// One instance drives one invocation; nothing is shared across
/// invocations except the client's credential cache. The returned report
/// identifier is the only artifact that outlives the run.
pub struct UploadWorkflow<'a> {
    client: &'a DentiqClient,
}

impl<'a> UploadWorkflow<'a> {
    /// Create a workflow over the given client
    pub fn new(client: &'a DentiqClient) -> Self {
        Self { client }
    }

    /// Run the full upload pipeline and return the report identifier
    ///
    /// The optional callback observes stage transitions and, during the
    /// transfer, throttled progress percentages. It is observability
    /// only; the pipeline neither waits for nor depends on it.
    #[instrument(skip(self, progress), fields(patient = patient_uid, file = %path.display()))]
    pub async fn run<F>(
        &self,
        patient_uid: &str,
        path: &Path,
        progress: Option<F>,
    ) -> UploadResult
    where
        F: FnMut(UploadStage, Option<f64>) + Send + 'static,
    {
        // The transfer stream needs a 'static observer, so the callback is
        // shared between stage reporting and the uploader.
        let progress = Arc::new(Mutex::new(progress));
        let report = |stage: UploadStage, pct: Option<f64>| {
            if let Ok(mut guard) = progress.lock() {
                if let Some(cb) = guard.as_mut() {
                    cb(stage, pct);
                }
            }
        };

        let key = file_key(path).map_err(UploadError::at(UploadStage::Created))?;

        // Stage 1: create the study container, then open a session on it
        report(UploadStage::Created, None);
        let study = self
            .client
            .create_study(patient_uid)
            .await
            .map_err(UploadError::at(UploadStage::Created))?;
        info!(study_uid = %study.uid, "Study created");

        report(UploadStage::SessionOpen, None);
        let session_id = self
            .client
            .open_session(&study.uid)
            .await
            .map_err(UploadError::at(UploadStage::SessionOpen))?;
        info!(session_id = %session_id, "Upload session opened");

        // Stage 2: one pre-signed URL for the payload's base name
        report(UploadStage::UrlsIssued, None);
        let urls = self
            .client
            .request_upload_urls(&session_id, &[key])
            .await
            .map_err(UploadError::at(UploadStage::UrlsIssued))?;

        // Stage 3: stream the payload. On failure the session is simply
        // abandoned; the remote side expires it on its own.
        report(UploadStage::Uploading, Some(0.0));
        let observer: ProgressObserver = {
            let progress = Arc::clone(&progress);
            Box::new(move |p: TransferProgress| {
                if let Ok(mut guard) = progress.lock() {
                    if let Some(cb) = guard.as_mut() {
                        cb(UploadStage::Uploading, Some(p.percent()));
                    }
                }
            })
        };
        self.client
            .uploader()
            .upload(path, &urls[0].url, Some(observer))
            .await
            .map_err(UploadError::at(UploadStage::Uploading))?;

        // Stage 4: close the session and poll until processing resolves
        report(UploadStage::SessionClosing, None);
        self.client
            .close_session(&session_id)
            .await
            .map_err(UploadError::at(UploadStage::SessionClosing))?;

        self.wait_for_session_close(&session_id)
            .await
            .map_err(UploadError::at(UploadStage::SessionClosing))?;
        report(UploadStage::SessionClosed, None);

        // Stage 5: request the analysis; its identifier is the durable
        // handle handed back to the caller.
        let analysis = self
            .client
            .request_analysis(&study.uid)
            .await
            .map_err(UploadError::at(UploadStage::AnalysisRequested))?;
        report(UploadStage::AnalysisRequested, None);

        let report_id = analysis
            .report_id()
            .ok_or(DentiqError::MissingReportId)
            .map_err(UploadError::at(UploadStage::AnalysisRequested))?
            .to_string();

        info!(report_id = %report_id, "Analysis requested");
        report(UploadStage::Done, Some(100.0));

        Ok(report_id)
    }

    /// Poll session-info at a fixed interval until the session reaches a
    /// terminal state or the attempt ceiling runs out
    ///
    /// A transport or server failure on a single attempt skips that tick;
    /// only the ceiling bounds total wait. Exhausting the ceiling without
    /// a terminal state is an explicit timeout failure.
    async fn wait_for_session_close(&self, session_id: &str) -> crate::error::Result<()> {
        let interval = self.client.config().session_poll_interval();
        let attempts = self.client.config().timeouts.session_poll_attempts;

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;

            let info = match self.client.session_info(session_id).await {
                Ok(info) => info,
                Err(e) if e.is_transport() || matches!(e, DentiqError::Server { .. }) => {
                    warn!(attempt, error = %e, "Session poll attempt failed, retrying");
                    continue;
                }
                // Decode and auth failures are not transient; abort.
                Err(e) => return Err(e),
            };

            match info.status {
                SessionState::Closed => {
                    info!(attempt, "Session processing complete");
                    return Ok(());
                }
                SessionState::Error => {
                    return Err(DentiqError::SessionFailed(
                        info.error.unwrap_or_else(|| "unknown remote error".into()),
                    ));
                }
                _ => {}
            }
        }

        Err(DentiqError::SessionTimeout { attempts })
    }
}

/// The upload key: the payload file's base name
fn file_key(path: &Path) -> crate::error::Result<String> {
    if path.as_os_str().is_empty() {
        return Err(DentiqError::Config("file path is required".into()));
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DentiqError::Config(format!("no file name in path {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(UploadStage::Uploading.to_string(), "payload transfer");
        assert_eq!(UploadStage::Done.to_string(), "done");
    }

    #[test]
    fn test_error_carries_stage() {
        let err = UploadError::at(UploadStage::UrlsIssued)(DentiqError::server(
            "request-upload-urls",
            200,
            "no upload_urls returned",
        ));
        assert_eq!(err.stage(), Some(UploadStage::UrlsIssued));
        assert!(err.to_string().contains("upload-url request"));

        assert_eq!(UploadError::Cancelled.stage(), None);
    }

    #[test]
    fn test_file_key() {
        assert_eq!(file_key(Path::new("/tmp/study.dcm")).unwrap(), "study.dcm");
        assert!(file_key(Path::new("")).is_err());
    }
}

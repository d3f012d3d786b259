//! Streaming upload to pre-signed destination URLs
//!
//! Pre-signed URLs embed their own credentials, so no `Authorization`
//! header is attached here. Most pre-signed backends require the exact
//! byte length declared up front; a payload that cannot be sized fails
//! before any bytes are sent.

use std::path::Path;
use std::time::{Duration, Instant};

use futures::TryStreamExt;
use reqwest::header;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};

use crate::error::{DentiqError, Result};

/// Minimum interval between progress observations
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// A progress observation during a streamed transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    /// Bytes sent so far
    pub bytes_sent: u64,

    /// Total bytes declared up front
    pub bytes_total: u64,
}

impl TransferProgress {
    /// Progress percentage (0-100)
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            return 100.0;
        }
        (self.bytes_sent as f64 / self.bytes_total as f64) * 100.0
    }
}

/// Observer invoked at most every two seconds during a transfer
pub type ProgressObserver = Box<dyn FnMut(TransferProgress) + Send>;

/// Streamed PUT transfer to pre-signed URLs
///
/// Holds the dedicated HTTP client that carries no total timeout: large
/// studies may legitimately take a long time, and any deadline belongs
/// to the caller.
#[derive(Debug, Clone)]
pub struct StreamingUploader {
    client: reqwest::Client,
}

impl StreamingUploader {
    /// Create an uploader over the given (untimed) HTTP client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream a local file to a pre-signed destination URL
    ///
    /// The file is read forward-only and never buffered whole. Progress
    /// observations are an observability side channel; the transfer
    /// succeeds or fails regardless of whether anyone is listening.
    #[instrument(skip(self, observer), fields(dest = %redact(dest_url)))]
    pub async fn upload(
        &self,
        path: &Path,
        dest_url: &str,
        observer: Option<ProgressObserver>,
    ) -> Result<()> {
        let file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();

        info!(total_bytes = total, "Streaming payload to upload URL");

        let body = reqwest::Body::wrap_stream(progress_stream(file, total, observer));

        let response = self
            .client
            .put(dest_url)
            .header(header::CONTENT_LENGTH, total)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DentiqError::Transfer {
                status: status.as_u16(),
                body,
            });
        }

        info!(total_bytes = total, "Payload transfer complete");
        Ok(())
    }
}

/// Wrap a file in a chunk stream that reports throttled progress
fn progress_stream(
    file: tokio::fs::File,
    total: u64,
    mut observer: Option<ProgressObserver>,
) -> impl futures::TryStream<Ok = bytes::Bytes, Error = std::io::Error> + Send + 'static {
    let mut sent: u64 = 0;
    let mut last_report = Instant::now();

    ReaderStream::new(file).inspect_ok(move |chunk| {
        sent += chunk.len() as u64;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            last_report = Instant::now();
            let progress = TransferProgress {
                bytes_sent: sent,
                bytes_total: total,
            };
            debug!(
                bytes_sent = progress.bytes_sent,
                bytes_total = progress.bytes_total,
                percent = format!("{:.1}", progress.percent()),
                "Upload progress"
            );
            if let Some(cb) = observer.as_mut() {
                cb(progress);
            }
        }
    })
}

/// Strip the query string (embedded credentials) from a pre-signed URL
/// before it reaches the logs.
fn redact(dest_url: &str) -> &str {
    dest_url.split('?').next().unwrap_or(dest_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let progress = TransferProgress {
            bytes_sent: 5 * 1024 * 1024,
            bytes_total: 10 * 1024 * 1024,
        };
        assert!((progress.percent() - 50.0).abs() < f64::EPSILON);

        let empty = TransferProgress {
            bytes_sent: 0,
            bytes_total: 0,
        };
        assert!((empty.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_redact_strips_query() {
        assert_eq!(
            redact("https://bucket.example.com/key?X-Amz-Signature=abc"),
            "https://bucket.example.com/key"
        );
        assert_eq!(redact("https://bucket.example.com/key"), "https://bucket.example.com/key");
    }

    #[tokio::test]
    async fn test_upload_missing_file_fails_before_send() {
        let uploader = StreamingUploader::new(reqwest::Client::new());
        let err = uploader
            .upload(
                Path::new("/nonexistent/payload.dcm"),
                "http://localhost:1/never",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DentiqError::Io(_)));
    }
}

//! Partner-API HTTP client implementation

use std::path::Path;

use chrono::Utc;
use futures::StreamExt;
use reqwest::header;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::CredentialCache;
use crate::config::DentiqConfig;
use crate::error::{DentiqError, Result};
use crate::transfer::StreamingUploader;
use crate::types::*;

/// Client for the Dentiq imaging-diagnostics partner API
///
/// Every method builds one HTTP request, attaches the `Authorization`
/// header from the credential cache, and decodes one response. Workflow
/// sequencing lives in [`crate::upload`].
#[derive(Debug)]
pub struct DentiqClient {
    http: reqwest::Client,
    base_url: Url,
    auth: CredentialCache,
    uploader: StreamingUploader,
    config: DentiqConfig,
}

impl DentiqClient {
    /// Create a new client from configuration
    pub fn new(config: DentiqConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.connection.base_url)?;

        // Partner base URLs carry a path prefix (e.g. `/partner-api`);
        // relative joins drop the last segment unless it ends with a slash.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        // Large payloads may legitimately take a long time; the transfer
        // client carries a connect timeout only.
        let transfer = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        let auth = CredentialCache::new(
            config.connection.clone(),
            base_url.clone(),
            config.token_validity(),
            http.clone(),
        );

        Ok(Self {
            http,
            base_url,
            auth,
            uploader: StreamingUploader::new(transfer),
            config,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the configuration
    pub fn config(&self) -> &DentiqConfig {
        &self.config
    }

    /// Get the streaming uploader for pre-signed-URL transfers
    pub fn uploader(&self) -> &StreamingUploader {
        &self.uploader
    }

    /// Get the credential cache
    pub fn credentials(&self) -> &CredentialCache {
        &self.auth
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    /// Probe the partner API with an authenticated participants listing
    #[instrument(skip(self))]
    pub async fn check_connection(&self) -> Result<()> {
        let url = self.base_url.join("v2/participants")?;
        let response = self.authed(self.http.get(url)).await?.send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DentiqError::server("participants", status.as_u16(), body))
        }
    }

    // =========================================================================
    // Study Creation
    // =========================================================================

    /// Create a remote study container for a patient
    ///
    /// Study name, type and date come from the configured defaults; the
    /// date is stamped at call time (UTC).
    #[instrument(skip(self))]
    pub async fn create_study(&self, patient_uid: &str) -> Result<RemoteStudy> {
        let url = self
            .base_url
            .join(&format!("v2/patients/{}/studies", patient_uid))?;
        debug!("Creating study at {}", url);

        let body = StudyCreateRequest {
            study_name: Some(self.config.study.study_name.clone()),
            study_type: self.config.study.study_type.clone(),
            study_date: Some(Utc::now().format("%Y-%m-%d").to_string()),
        };

        let response = self.authed(self.http.post(url)).await?.json(&body).send().await?;
        let study: RemoteStudy = self.handle_response("create-study", response).await?;

        if study.uid.is_empty() {
            return Err(DentiqError::server(
                "create-study",
                200,
                "study uid missing in response",
            ));
        }

        Ok(study)
    }

    // =========================================================================
    // Upload Session
    // =========================================================================

    /// Open an upload session against a study container
    #[instrument(skip(self))]
    pub async fn open_session(&self, study_uid: &str) -> Result<String> {
        let url = self.base_url.join("v1/upload/open-session")?;
        let body = OpenSessionRequest {
            study_uid: study_uid.to_string(),
        };

        let response = self.authed(self.http.post(url)).await?.json(&body).send().await?;
        let decoded: OpenSessionResponse = self.handle_response("open-session", response).await?;

        if decoded.session_id.is_empty() {
            return Err(DentiqError::server(
                "open-session",
                200,
                format!(
                    "empty session_id (error={})",
                    decoded.error.unwrap_or_default()
                ),
            ));
        }

        Ok(decoded.session_id)
    }

    /// Request pre-signed upload URLs, one per file key
    #[instrument(skip(self))]
    pub async fn request_upload_urls(
        &self,
        session_id: &str,
        keys: &[String],
    ) -> Result<Vec<UploadUrl>> {
        let url = self.base_url.join("v1/upload/request-upload-urls")?;
        let body = RequestUploadUrlsRequest {
            session_id: session_id.to_string(),
            keys: keys.to_vec(),
        };

        let response = self.authed(self.http.post(url)).await?.json(&body).send().await?;
        let decoded: RequestUploadUrlsResponse =
            self.handle_response("request-upload-urls", response).await?;

        if decoded.upload_urls.is_empty() {
            return Err(DentiqError::server(
                "request-upload-urls",
                200,
                format!(
                    "no upload_urls returned (error={})",
                    decoded.error.unwrap_or_default()
                ),
            ));
        }

        Ok(decoded.upload_urls)
    }

    /// Start closing an upload session, triggering server-side processing
    #[instrument(skip(self))]
    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let url = self.base_url.join("v1/upload/start-session-close")?;
        let body = CloseSessionRequest {
            session_id: session_id.to_string(),
        };

        let response = self.authed(self.http.post(url)).await?.json(&body).send().await?;
        let _: CloseSessionResponse = self.handle_response("close-session", response).await?;

        Ok(())
    }

    /// Query the processing state of an upload session
    #[instrument(skip(self))]
    pub async fn session_info(&self, session_id: &str) -> Result<SessionInfo> {
        let mut url = self.base_url.join("v1/upload/session-info")?;
        url.query_pairs_mut().append_pair("session_id", session_id);

        let response = self.authed(self.http.get(url)).await?.send().await?;
        let decoded: SessionInfoResponse = self.handle_response("session-info", response).await?;

        Ok(decoded.session_info)
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Request an analysis over an uploaded study
    #[instrument(skip(self))]
    pub async fn request_analysis(&self, study_uid: &str) -> Result<AnalysisResponse> {
        let url = self
            .base_url
            .join(&format!("v2/studies/{}/analyses", study_uid))?;
        let body = RequestAnalysisRequest {
            analysis_type: self.config.study.analysis_type.clone(),
        };

        let response = self.authed(self.http.post(url)).await?.json(&body).send().await?;
        self.handle_response("request-analysis", response).await
    }

    /// Fetch a report by identifier (without diagnoses)
    ///
    /// [`analysis_status`](Self::analysis_status) layers the diagnoses
    /// fetch on top of this call.
    #[instrument(skip(self))]
    pub async fn get_report(&self, report_id: &str) -> Result<Report> {
        let url = self.base_url.join(&format!("v2/analyses/{}", report_id))?;
        debug!("Fetching report from {}", url);

        let response = self.authed(self.http.get(url)).await?.send().await?;
        self.handle_response("analysis-status", response).await
    }

    /// Fetch the structured diagnoses of a completed report
    #[instrument(skip(self))]
    pub async fn get_diagnoses(&self, report_id: &str) -> Result<DiagnosesResponse> {
        let url = self
            .base_url
            .join(&format!("v2/analyses/{}/diagnoses", report_id))?;

        let response = self.authed(self.http.get(url)).await?.send().await?;
        self.handle_response("diagnoses", response).await
    }

    /// List all analyses recorded for a patient
    #[instrument(skip(self))]
    pub async fn list_analyses(&self, patient_uid: &str) -> Result<Vec<Report>> {
        let mut url = self.base_url.join("v2/analyses")?;
        url.query_pairs_mut().append_pair("patient_uid", patient_uid);

        let response = self.authed(self.http.get(url)).await?.send().await?;
        self.handle_response("analyses", response).await
    }

    /// Download a report PDF, streaming the body to `dest`
    ///
    /// Missing parent directories are created. The file is written
    /// chunk-by-chunk; the full document is never held in memory.
    #[instrument(skip(self))]
    pub async fn download_pdf(&self, report_id: &str, dest: &Path) -> Result<()> {
        if report_id.is_empty() {
            return Err(DentiqError::Config("report id is required".into()));
        }

        let url = self
            .base_url
            .join(&format!("v2/analyses/{}/pdf", report_id))?;

        if let Some(dir) = dest.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let response = self
            .authed(self.http.get(url))
            .await?
            .header(header::ACCEPT, "application/pdf")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DentiqError::server("pdf", status.as_u16(), body));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DentiqError::Transfer {
                status: status.as_u16(),
                body: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    async fn authed(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let header_value = self.auth.auth_header().await?;
        Ok(request.header(header::AUTHORIZATION, header_value))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DentiqError::server(endpoint, status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DentiqError::decode(endpoint, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DentiqConfig;

    #[test]
    fn test_client_creation() {
        let config = DentiqConfig::builder("http://localhost:9080")
            .api_key("key")
            .build();
        assert!(DentiqClient::new(config).is_ok());
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let config = DentiqConfig::builder("http://localhost:9080/partner-api")
            .api_key("key")
            .build();
        let client = DentiqClient::new(config).unwrap();
        let joined = client.base_url().join("v2/participants").unwrap();
        assert_eq!(
            joined.as_str(),
            "http://localhost:9080/partner-api/v2/participants"
        );
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let config = DentiqConfig::builder("not a url").build();
        assert!(matches!(
            DentiqClient::new(config),
            Err(DentiqError::InvalidUrl(_))
        ));
    }
}

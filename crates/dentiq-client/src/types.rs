//! Wire types for the partner API (JSON request/response bodies)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Authentication
// =============================================================================

/// Request body for the identity endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenRequest {
    /// Caller identifier recorded by the issuer
    pub client_host_id: String,

    /// Account email
    pub email: String,

    /// Account password
    pub password: String,
}

/// Response from the identity endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    /// Bearer session token
    pub token: String,
}

// =============================================================================
// Study Creation
// =============================================================================

/// Request body for creating a remote study container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyCreateRequest {
    /// Display name recorded on the remote side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_name: Option<String>,

    /// Study type: "CBCT", "PANORAMA", "FMX", "STL"
    pub study_type: String,

    /// Study date, e.g. "2026-01-11"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_date: Option<String>,
}

/// A remote study container
///
/// `uid` is the legacy identifier the upload endpoints expect; `id_v3` is
/// the newer xid format returned alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStudy {
    /// Legacy study uid (what `/v1/upload/open-session` wants)
    #[serde(default)]
    pub uid: String,

    /// New-format identifier
    #[serde(default)]
    pub id_v3: Option<String>,
}

// =============================================================================
// Upload Session
// =============================================================================

/// Request body for opening an upload session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    /// Study container the session uploads into
    pub study_uid: String,
}

/// Response from opening an upload session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    #[serde(default)]
    pub ok: bool,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub error: Option<String>,
}

/// Request body for pre-signed upload URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestUploadUrlsRequest {
    pub session_id: String,

    /// One key per file, usually the file's base name
    pub keys: Vec<String>,
}

/// A pre-signed upload destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrl {
    pub key: String,
    pub url: String,
}

/// Response carrying pre-signed upload URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestUploadUrlsResponse {
    #[serde(default)]
    pub ok: bool,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub upload_urls: Vec<UploadUrl>,
}

/// Request body for starting session close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: String,
}

/// Response acknowledging session close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    #[serde(default)]
    pub ok: bool,

    #[serde(default)]
    pub error: Option<String>,
}

/// Response from the session-info endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfoResponse {
    #[serde(default)]
    pub ok: bool,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub session_info: SessionInfo,
}

/// Remote-side state of an upload session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub status: SessionState,

    #[serde(default)]
    pub error: Option<String>,
}

/// Upload-session lifecycle state as reported by the remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session open, accepting files
    #[default]
    Started,

    /// Close requested, server-side processing in progress
    Closing,

    /// Processing complete
    Closed,

    /// Processing failed
    Error,

    /// Any state this client does not model
    #[serde(other)]
    Unknown,
}

impl SessionState {
    /// Whether the session has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Error)
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Request body for requesting an analysis over an uploaded study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAnalysisRequest {
    /// Analysis type: "GP", "CBCT_ORTHO", ...
    pub analysis_type: String,
}

/// Response from requesting an analysis
///
/// Either identifier may be absent; `report_id()` picks whichever is
/// populated, preferring `uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default)]
    pub id_v3: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}

impl AnalysisResponse {
    /// The durable report identifier: `uid`, falling back to `id_v3`.
    /// Returns `None` when both are empty.
    pub fn report_id(&self) -> Option<&str> {
        self.uid
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.id_v3.as_deref().filter(|s| !s.is_empty()))
    }
}

/// An analysis report, as returned by `/v2/analyses/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub complete: bool,

    #[serde(default)]
    pub pdf_url: Option<String>,

    #[serde(default)]
    pub webpage_url: Option<String>,

    #[serde(default)]
    pub preview_url: Option<String>,

    /// Kept raw: the remote encodes errors as either a string or an object
    #[serde(default)]
    pub error: Option<serde_json::Value>,

    /// Structured diagnoses, populated only once the report is complete
    /// and the diagnoses fetch succeeded
    #[serde(default)]
    pub diagnoses: Option<DiagnosesResponse>,
}

impl Report {
    /// Whether the remote considers the analysis finished
    pub fn is_complete(&self) -> bool {
        self.complete || self.status == "complete"
    }
}

/// One diagnosis entry for a single tooth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub tooth_number: i32,

    #[serde(default)]
    pub text_comment: String,

    /// Kept raw to ride out remote schema changes
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,

    #[serde(default)]
    pub periodontal_status: Option<serde_json::Value>,
}

/// Structured diagnoses for a completed report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosesResponse {
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
}

/// A report bundled with its diagnoses and fetch provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportExport {
    /// When this export was assembled
    pub fetched_at: DateTime<Utc>,

    /// Partner API the data came from
    pub source: String,

    pub report_id: String,

    pub report: Report,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnoses: Option<DiagnosesResponse>,
}

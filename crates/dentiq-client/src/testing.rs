//! Test utilities for dentiq-client
//!
//! Provides an in-process mock of the partner API plus a [`TestServer`]
//! wrapper that serves it on an ephemeral port. Integration tests script
//! the mock's session-status sequence and inspect its request log.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Json;
use serde_json::json;
use tokio::net::TcpListener;

use crate::error::Result;

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve an axum Router on an ephemeral local port
    pub async fn start(router: axum::Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Scripted state backing the mock partner API
///
/// Fields are plain knobs; construct with struct-update syntax over
/// [`MockRemote::default()`] and wrap in an `Arc` for the router.
#[derive(Debug)]
pub struct MockRemote {
    /// Study uid issued by create-study
    pub study_uid: String,

    /// Session id issued by open-session
    pub session_id: String,

    /// Upload URLs issued per requested key; `0` scripts an empty list
    pub upload_url_count: usize,

    /// Status returned by the pre-signed PUT endpoint
    pub transfer_status: u16,

    /// Session-info statuses, consumed one per poll; exhausted → "closed"
    pub session_script: Mutex<VecDeque<&'static str>>,

    /// Error detail reported alongside an "error" session status
    pub session_error: String,

    /// `uid` field of the analysis response (None omits it)
    pub analysis_uid: Option<String>,

    /// `id_v3` field of the analysis response
    pub analysis_id_v3: Option<String>,

    /// Report status string returned by the analyses endpoint
    pub report_status: String,

    /// Report completion flag
    pub report_complete: bool,

    /// Status returned by the diagnoses endpoint
    pub diagnoses_status: u16,

    /// Artificial delay inside the identity endpoint, to widen race windows
    pub auth_delay: Duration,

    /// Number of identity-endpoint calls observed
    pub auth_calls: AtomicU32,

    /// Log of "METHOD /path" for every request received
    pub requests: Mutex<Vec<String>>,

    /// Key and byte count of every payload received on the PUT endpoint
    pub uploads: Mutex<Vec<(String, usize)>>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self {
            study_uid: "study-1".to_string(),
            session_id: "sess-1".to_string(),
            upload_url_count: 1,
            transfer_status: 200,
            session_script: Mutex::new(VecDeque::new()),
            session_error: "processing failed".to_string(),
            analysis_uid: Some("an-1".to_string()),
            analysis_id_v3: None,
            report_status: "pending".to_string(),
            report_complete: false,
            diagnoses_status: 200,
            auth_delay: Duration::ZERO,
            auth_calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl MockRemote {
    /// Script the session-info statuses, one per poll
    pub fn script_session(&self, statuses: &[&'static str]) {
        let mut script = self.session_script.lock().unwrap();
        script.clear();
        script.extend(statuses);
    }

    /// Number of requests whose "METHOD /path" line starts with `prefix`
    pub fn count_requests(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }

    fn log(&self, method: &str, path: &str) {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", method, path));
    }
}

/// Build the mock partner-API router over scripted state
pub fn mock_router(state: Arc<MockRemote>) -> axum::Router {
    axum::Router::new()
        .route("/v2/auth/token", post(auth_token))
        .route("/v2/participants", get(participants))
        .route("/v2/patients/{patient}/studies", post(create_study))
        .route("/v1/upload/open-session", post(open_session))
        .route("/v1/upload/request-upload-urls", post(request_upload_urls))
        .route("/s3/{key}", put(receive_payload))
        .route("/v1/upload/start-session-close", post(close_session))
        .route("/v1/upload/session-info", get(session_info))
        .route("/v2/studies/{uid}/analyses", post(request_analysis))
        .route("/v2/analyses", get(list_analyses))
        .route("/v2/analyses/{id}", get(get_report))
        .route("/v2/analyses/{id}/diagnoses", get(get_diagnoses))
        .route("/v2/analyses/{id}/pdf", get(get_pdf))
        // Imaging payloads exceed the 2 MiB default body limit
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024 * 1024))
        .with_state(state)
}

async fn auth_token(State(state): State<Arc<MockRemote>>) -> impl IntoResponse {
    state.log("POST", "/v2/auth/token");
    if !state.auth_delay.is_zero() {
        tokio::time::sleep(state.auth_delay).await;
    }
    state.auth_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "token": "session-token-1" }))
}

async fn participants(State(state): State<Arc<MockRemote>>) -> impl IntoResponse {
    state.log("GET", "/v2/participants");
    Json(json!([]))
}

async fn create_study(
    State(state): State<Arc<MockRemote>>,
    Path(patient): Path<String>,
) -> impl IntoResponse {
    state.log("POST", &format!("/v2/patients/{}/studies", patient));
    Json(json!({ "uid": state.study_uid, "id_v3": "xid-study-1" }))
}

async fn open_session(State(state): State<Arc<MockRemote>>) -> impl IntoResponse {
    state.log("POST", "/v1/upload/open-session");
    Json(json!({ "ok": true, "session_id": state.session_id }))
}

async fn request_upload_urls(
    State(state): State<Arc<MockRemote>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.log("POST", "/v1/upload/request-upload-urls");

    // Pre-signed URLs point back at this mock's own PUT endpoint
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("127.0.0.1")
        .to_string();

    let keys: Vec<String> = body["keys"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|k| k.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let urls: Vec<serde_json::Value> = keys
        .iter()
        .take(state.upload_url_count)
        .map(|key| json!({ "key": key, "url": format!("http://{}/s3/{}", host, key) }))
        .collect();

    Json(json!({ "ok": true, "upload_urls": urls }))
}

async fn receive_payload(
    State(state): State<Arc<MockRemote>>,
    Path(key): Path<String>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    state.log("PUT", &format!("/s3/{}", key));
    state.uploads.lock().unwrap().push((key, body.len()));
    let status = StatusCode::from_u16(state.transfer_status).unwrap_or(StatusCode::OK);
    let body = if status.is_success() {
        String::new()
    } else {
        format!("rejected {} bytes", body.len())
    };
    (status, body)
}

async fn close_session(State(state): State<Arc<MockRemote>>) -> impl IntoResponse {
    state.log("POST", "/v1/upload/start-session-close");
    Json(json!({ "ok": true }))
}

async fn session_info(
    State(state): State<Arc<MockRemote>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> impl IntoResponse {
    state.log("GET", "/v1/upload/session-info");
    let _session_id = params.get("session_id");

    let status = state
        .session_script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or("closed");

    let error = if status == "error" {
        Some(state.session_error.clone())
    } else {
        None
    };

    Json(json!({
        "ok": true,
        "session_info": { "status": status, "error": error }
    }))
}

async fn request_analysis(
    State(state): State<Arc<MockRemote>>,
    Path(uid): Path<String>,
) -> impl IntoResponse {
    state.log("POST", &format!("/v2/studies/{}/analyses", uid));
    Json(json!({
        "uid": state.analysis_uid,
        "id_v3": state.analysis_id_v3,
        "status": "requested"
    }))
}

async fn list_analyses(State(state): State<Arc<MockRemote>>) -> impl IntoResponse {
    state.log("GET", "/v2/analyses");
    Json(json!([
        {
            "id": state.analysis_uid.clone().unwrap_or_default(),
            "status": state.report_status,
            "complete": state.report_complete
        }
    ]))
}

async fn get_report(
    State(state): State<Arc<MockRemote>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.log("GET", &format!("/v2/analyses/{}", id));
    Json(json!({
        "id": id,
        "status": state.report_status,
        "complete": state.report_complete,
        "pdf_url": "https://reports.example.com/report.pdf"
    }))
}

async fn get_diagnoses(
    State(state): State<Arc<MockRemote>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.log("GET", &format!("/v2/analyses/{}/diagnoses", id));
    let status = StatusCode::from_u16(state.diagnoses_status).unwrap_or(StatusCode::OK);
    if !status.is_success() {
        return (status, Json(json!({ "error": "diagnoses unavailable" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "diagnoses": [
                { "tooth_number": 36, "text_comment": "Caries on distal surface" }
            ]
        })),
    )
}

async fn get_pdf(
    State(state): State<Arc<MockRemote>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.log("GET", &format!("/v2/analyses/{}/pdf", id));
    (
        [(axum::http::header::CONTENT_TYPE, "application/pdf")],
        b"%PDF-1.4 mock report".to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_script_consumed_in_order() {
        let mock = MockRemote::default();
        mock.script_session(&["started", "closing"]);

        let mut script = mock.session_script.lock().unwrap();
        assert_eq!(script.pop_front(), Some("started"));
        assert_eq!(script.pop_front(), Some("closing"));
        assert_eq!(script.pop_front(), None);
    }

    #[test]
    fn test_request_counting() {
        let mock = MockRemote::default();
        mock.log("POST", "/v1/upload/open-session");
        mock.log("GET", "/v1/upload/session-info");
        mock.log("GET", "/v1/upload/session-info");

        assert_eq!(mock.count_requests("GET /v1/upload/session-info"), 2);
        assert_eq!(mock.count_requests("PUT /s3/"), 0);
    }
}

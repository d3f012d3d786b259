//! Integration tests for dentiq-client
//!
//! These tests run the client against an in-process scripted mock of the
//! partner API and assert the workflow's ordering, polling, and failure
//! behavior from the outside.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dentiq_client::testing::{mock_router, MockRemote, TestServer};
use dentiq_client::{
    DentiqClient, DentiqConfig, DentiqError, UploadError, UploadService, UploadStage,
    UploadWorkflow,
};

// =============================================================================
// Test Helpers
// =============================================================================

const POLL_MS: u64 = 25;

async fn start_mock(mock: Arc<MockRemote>) -> TestServer {
    TestServer::start(mock_router(mock))
        .await
        .expect("Failed to start mock partner API")
}

/// Client configured with a static key and a compressed poll cadence
fn test_client(server: &TestServer) -> DentiqClient {
    let config = DentiqConfig::builder(server.base_url())
        .api_key("test-key")
        .session_poll_ms(POLL_MS)
        .build();
    DentiqClient::new(config).expect("Failed to create client")
}

/// Write a payload of the given size to a temp file
fn payload_file(bytes: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".dcm")
        .tempfile()
        .expect("Failed to create payload file");
    file.write_all(&vec![0u8; bytes])
        .expect("Failed to write payload");
    file.flush().unwrap();
    file
}

async fn run_upload(client: &DentiqClient, path: &Path) -> Result<String, UploadError> {
    UploadWorkflow::new(client)
        .run("patient-42", path, None::<fn(UploadStage, Option<f64>)>)
        .await
}

// =============================================================================
// End-to-End Upload
// =============================================================================

#[tokio::test]
async fn test_upload_study_end_to_end() {
    let mock = Arc::new(MockRemote::default());
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(10 * 1024 * 1024);
    let report_id = run_upload(&client, payload.path()).await.unwrap();

    assert_eq!(report_id, "an-1");

    // Full payload arrived under the file's base name
    let uploads = mock.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, 10 * 1024 * 1024);
    assert!(uploads[0].0.ends_with(".dcm"));

    // Static key: the identity endpoint is never consulted
    assert_eq!(
        mock.auth_calls.load(std::sync::atomic::Ordering::SeqCst),
        0
    );

    // Stage ordering, as seen by the remote
    let requests = mock.requests.lock().unwrap().clone();
    let position = |prefix: &str| {
        requests
            .iter()
            .position(|r| r.starts_with(prefix))
            .unwrap_or_else(|| panic!("missing request {}", prefix))
    };
    assert!(position("POST /v2/patients/") < position("POST /v1/upload/open-session"));
    assert!(position("POST /v1/upload/open-session") < position("PUT /s3/"));
    assert!(position("PUT /s3/") < position("POST /v1/upload/start-session-close"));
    assert!(position("POST /v1/upload/start-session-close") < position("POST /v2/studies/"));
}

#[tokio::test]
async fn test_report_id_falls_back_to_id_v3() {
    let mock = Arc::new(MockRemote {
        analysis_uid: None,
        analysis_id_v3: Some("xid-9".to_string()),
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(1024);
    let report_id = run_upload(&client, payload.path()).await.unwrap();
    assert_eq!(report_id, "xid-9");
}

#[tokio::test]
async fn test_missing_report_id_fails_analysis_stage() {
    let mock = Arc::new(MockRemote {
        analysis_uid: None,
        analysis_id_v3: None,
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(1024);
    let err = run_upload(&client, payload.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some(UploadStage::AnalysisRequested));
    assert!(matches!(
        err,
        UploadError::Stage {
            source: DentiqError::MissingReportId,
            ..
        }
    ));
}

// =============================================================================
// Stage Abort Behavior
// =============================================================================

#[tokio::test]
async fn test_no_upload_urls_aborts_before_transfer() {
    let mock = Arc::new(MockRemote {
        upload_url_count: 0,
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(1024);
    let err = run_upload(&client, payload.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some(UploadStage::UrlsIssued));

    // Stages 3-6 never ran: no transfer, no close, no analysis request
    assert_eq!(mock.count_requests("PUT /s3/"), 0);
    assert_eq!(mock.count_requests("POST /v1/upload/start-session-close"), 0);
    assert_eq!(mock.count_requests("POST /v2/studies/"), 0);
}

#[tokio::test]
async fn test_transfer_failure_skips_session_close() {
    let mock = Arc::new(MockRemote {
        transfer_status: 500,
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(1024);
    let err = run_upload(&client, payload.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some(UploadStage::Uploading));
    assert!(matches!(
        err,
        UploadError::Stage {
            source: DentiqError::Transfer { status: 500, .. },
            ..
        }
    ));

    // The session is abandoned, not closed
    assert_eq!(mock.count_requests("POST /v1/upload/start-session-close"), 0);
    assert_eq!(mock.count_requests("GET /v1/upload/session-info"), 0);
}

// =============================================================================
// Session-Close Polling
// =============================================================================

#[tokio::test]
async fn test_poll_proceeds_after_scripted_delay() {
    let mock = Arc::new(MockRemote::default());
    mock.script_session(&["started", "started", "started", "started", "started"]);
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(1024);
    let start = Instant::now();
    let report_id = run_upload(&client, payload.path()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report_id, "an-1");

    // Five "started" polls plus the one observing "closed"
    assert_eq!(mock.count_requests("GET /v1/upload/session-info"), 6);

    // Six fixed-interval waits, within tolerance
    assert!(elapsed >= Duration::from_millis(6 * POLL_MS));
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_poll_error_fails_immediately() {
    let mock = Arc::new(MockRemote::default());
    mock.script_session(&["error"]);
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let payload = payload_file(1024);
    let err = run_upload(&client, payload.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some(UploadStage::SessionClosing));
    match err {
        UploadError::Stage {
            source: DentiqError::SessionFailed(detail),
            ..
        } => assert_eq!(detail, "processing failed"),
        other => panic!("expected SessionFailed, got {:?}", other),
    }

    // Failed on the first poll; the attempt budget was not exhausted
    assert_eq!(mock.count_requests("GET /v1/upload/session-info"), 1);
    assert_eq!(mock.count_requests("POST /v2/studies/"), 0);
}

#[tokio::test]
async fn test_poll_budget_exhaustion_is_explicit_timeout() {
    let mock = Arc::new(MockRemote::default());
    mock.script_session(&["started", "started", "started", "started"]);
    let server = start_mock(mock.clone()).await;

    let config = DentiqConfig::builder(server.base_url())
        .api_key("test-key")
        .session_poll_ms(POLL_MS)
        .session_poll_attempts(3)
        .build();
    let client = DentiqClient::new(config).unwrap();

    let payload = payload_file(1024);
    let err = run_upload(&client, payload.path()).await.unwrap_err();

    assert!(matches!(
        err,
        UploadError::Stage {
            source: DentiqError::SessionTimeout { attempts: 3 },
            ..
        }
    ));

    // Timeout is a failure: no analysis is requested on the stale session
    assert_eq!(mock.count_requests("GET /v1/upload/session-info"), 3);
    assert_eq!(mock.count_requests("POST /v2/studies/"), 0);
}

// =============================================================================
// Credential Cache
// =============================================================================

#[tokio::test]
async fn test_concurrent_callers_trigger_one_refresh() {
    let mock = Arc::new(MockRemote {
        auth_delay: Duration::from_millis(50),
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;

    let config = DentiqConfig::builder(server.base_url())
        .credentials("clinic@example.com", "hunter2")
        .build();
    let client = Arc::new(DentiqClient::new(config).unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.check_connection().await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(
        mock.auth_calls.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

// =============================================================================
// Status Poller
// =============================================================================

#[tokio::test]
async fn test_status_incomplete_omits_diagnoses() {
    let mock = Arc::new(MockRemote::default());
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let report = client.analysis_status("an-1").await.unwrap();

    assert!(!report.is_complete());
    assert!(report.diagnoses.is_none());
    assert_eq!(mock.count_requests("GET /v2/analyses/an-1/diagnoses"), 0);
}

#[tokio::test]
async fn test_status_complete_includes_diagnoses() {
    let mock = Arc::new(MockRemote {
        report_status: "complete".to_string(),
        report_complete: true,
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let report = client.analysis_status("an-1").await.unwrap();

    assert!(report.is_complete());
    let diagnoses = report.diagnoses.expect("diagnoses should be attached");
    assert_eq!(diagnoses.diagnoses[0].tooth_number, 36);
}

#[tokio::test]
async fn test_status_tolerates_diagnoses_failure() {
    let mock = Arc::new(MockRemote {
        report_status: "complete".to_string(),
        report_complete: true,
        diagnoses_status: 500,
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let report = client.analysis_status("an-1").await.unwrap();

    // Primary status fields survive; diagnoses are simply absent
    assert!(report.is_complete());
    assert_eq!(report.status, "complete");
    assert!(report.diagnoses.is_none());
}

#[tokio::test]
async fn test_export_requires_diagnoses_when_complete() {
    let mock = Arc::new(MockRemote {
        report_status: "complete".to_string(),
        report_complete: true,
        ..MockRemote::default()
    });
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let export = client.export_report("an-1").await.unwrap();
    assert_eq!(export.report_id, "an-1");
    assert!(export.diagnoses.is_some());
    assert!(export.source.contains(&server.addr.to_string()));

    // A diagnoses failure fails the export, unlike the status check
    let failing = Arc::new(MockRemote {
        report_status: "complete".to_string(),
        report_complete: true,
        diagnoses_status: 500,
        ..MockRemote::default()
    });
    let server = start_mock(failing.clone()).await;
    let client = test_client(&server);

    let err = client.export_report("an-1").await.unwrap_err();
    assert!(matches!(err, DentiqError::Server { status: 500, .. }));
}

// =============================================================================
// PDF Download
// =============================================================================

#[tokio::test]
async fn test_download_pdf_streams_to_nested_path() {
    let mock = Arc::new(MockRemote::default());
    let server = start_mock(mock.clone()).await;
    let client = test_client(&server);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("reports").join("report_an-1.pdf");

    client.download_pdf("an-1", &dest).await.unwrap();

    let contents = std::fs::read(&dest).unwrap();
    assert!(contents.starts_with(b"%PDF"));
}

// =============================================================================
// Detached Service Tasks
// =============================================================================

#[tokio::test]
async fn test_spawn_upload_runs_completion_handler() {
    let mock = Arc::new(MockRemote::default());
    let server = start_mock(mock.clone()).await;
    let service = UploadService::new(Arc::new(test_client(&server)));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let payload = payload_file(1024);

    let handle = service.spawn_upload(
        "patient-42".to_string(),
        payload.path().to_path_buf(),
        move |result| {
            let _ = tx.send(result);
        },
    );

    handle.join().await;
    let result = rx.await.expect("completion handler did not run");
    assert_eq!(result.unwrap(), "an-1");
}

#[tokio::test]
async fn test_spawn_upload_cancellation_reaches_handler() {
    let mock = Arc::new(MockRemote::default());
    // Keep the session in "started" so the workflow sits in the poll loop
    mock.script_session(&["started"; 64]);
    let server = start_mock(mock.clone()).await;
    let service = UploadService::new(Arc::new(test_client(&server)));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let payload = payload_file(1024);

    let handle = service.spawn_upload(
        "patient-42".to_string(),
        payload.path().to_path_buf(),
        move |result| {
            let _ = tx.send(result);
        },
    );

    // Let the workflow get under way, then pull the plug
    tokio::time::sleep(Duration::from_millis(3 * POLL_MS)).await;
    handle.cancel();
    handle.join().await;

    let result = rx.await.expect("completion handler did not run");
    assert!(matches!(result, Err(UploadError::Cancelled)));
}

//! Dentiq Partner-API Client Library
//!
//! Provides a typed HTTP client for the Dentiq imaging-diagnostics
//! partner API, plus the upload workflow that drives a local imaging
//! study through the remote multi-stage pipeline and returns a durable
//! report identifier.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use dentiq_client::{DentiqClient, DentiqConfig, UploadService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DentiqConfig::builder("https://partner.example.com/partner-api")
//!         .api_key("secret")
//!         .build();
//!
//!     let service = UploadService::new(Arc::new(DentiqClient::new(config)?));
//!
//!     // Upload a study and hold on to the report identifier
//!     let report_id = service
//!         .upload_study("patient-42", Path::new("study.dcm"))
//!         .await?;
//!
//!     // Later, independently of the upload run:
//!     let report = service.analysis_status(&report_id).await?;
//!     if report.is_complete() {
//!         service.download_pdf(&report_id, Path::new("report.pdf")).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Authentication
//!
//! Either a static API key (takes priority, never expires) or an
//! email/password pair exchanged for a cached session token; see
//! [`DentiqConfig`].
//!
//! # Testing
//!
//! The `testing` module provides an in-process scripted mock of the
//! partner API:
//!
//! ```rust,ignore
//! use dentiq_client::testing::{mock_router, MockRemote, TestServer};
//!
//! let mock = Arc::new(MockRemote::default());
//! let server = TestServer::start(mock_router(mock.clone())).await?;
//! let config = DentiqConfig::builder(server.base_url()).api_key("k").build();
//! ```

mod auth;
mod client;
mod config;
mod error;
mod status;
mod transfer;
mod types;

pub mod service;
pub mod testing;
pub mod upload;

pub use auth::CredentialCache;
pub use client::DentiqClient;
pub use config::{ConfigError, ConnectionConfig, DentiqConfig, StudyConfig, TimeoutsConfig};
pub use error::{DentiqError, Result};
pub use transfer::{ProgressObserver, StreamingUploader, TransferProgress};
pub use types::*;

// Re-export the workflow and service surfaces for convenience
pub use service::{UploadHandle, UploadService};
pub use upload::{UploadError, UploadResult, UploadStage, UploadWorkflow};

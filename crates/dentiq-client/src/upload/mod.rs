//! Upload Workflow Module
//!
//! Drives a local imaging study through the partner's multi-stage upload
//! pipeline: study creation, session negotiation, streamed binary
//! transfer, session close, server-side processing, and the analysis
//! request that yields the durable report identifier.
//!
//! # Example
//!
//! ```rust,ignore
//! use dentiq_client::{DentiqClient, DentiqConfig};
//! use dentiq_client::upload::UploadWorkflow;
//!
//! let client = DentiqClient::new(DentiqConfig::from_yaml_file("dentiq.yaml")?)?;
//!
//! let report_id = UploadWorkflow::new(&client)
//!     .run("patient-42", Path::new("study.dcm"), None::<fn(_, _)>)
//!     .await?;
//!
//! // Later, independently:
//! let report = client.analysis_status(&report_id).await?;
//! ```

mod workflow;

pub use workflow::*;

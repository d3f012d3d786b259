//! Error types for partner-API client operations

use thiserror::Error;

/// Result type alias for partner-API client operations
pub type Result<T> = std::result::Result<T, DentiqError>;

/// Errors that can occur while talking to the Dentiq partner API
#[derive(Error, Debug)]
pub enum DentiqError {
    /// No credential source is configured (neither API key nor email/password)
    #[error("No credentials configured: set an API key or email/password")]
    NoCredentials,

    /// The identity endpoint rejected the configured email/password
    #[error("Authentication failed with status {status}: {body}")]
    AuthRejected { status: u16, body: String },

    /// The partner API returned a non-success HTTP status
    #[error("{endpoint} returned {status}: {body}")]
    Server {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// A response body could not be decoded
    #[error("Failed to decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    /// Binary upload or download failed
    #[error("Transfer failed with status {status}: {body}")]
    Transfer { status: u16, body: String },

    /// Remote processing of the upload session ended in an error state
    #[error("Session processing failed: {0}")]
    SessionFailed(String),

    /// The session-status poll budget ran out without a terminal state
    #[error("Session did not close within {attempts} poll attempts")]
    SessionTimeout { attempts: u32 },

    /// The analysis response carried neither identifier field
    #[error("Analysis response contained no report identifier")]
    MissingReportId,

    /// Required local input is missing or unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// HTTP request failed (transport level)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DentiqError {
    /// Create a server error from endpoint, status code and body
    pub fn server(endpoint: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            endpoint,
            status,
            body: body.into(),
        }
    }

    /// Create a decode error for the given endpoint
    pub fn decode(endpoint: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint,
            message: message.into(),
        }
    }

    /// Whether this error is a transport-level failure (connection refused,
    /// timeout, reset). The session-status poll skips an attempt on these
    /// instead of aborting the workflow.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = DentiqError::server("open-session", 502, "bad gateway");
        assert_eq!(err.to_string(), "open-session returned 502: bad gateway");
    }

    #[test]
    fn test_decode_is_not_transport() {
        let err = DentiqError::decode("session-info", "expected value at line 1");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_timeout_display_names_budget() {
        let err = DentiqError::SessionTimeout { attempts: 180 };
        assert!(err.to_string().contains("180"));
    }
}

//! Client configuration with YAML support

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Partner-API client configuration
///
/// Can be loaded from YAML, JSON, or constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DentiqConfig {
    /// Connection settings
    pub connection: ConnectionConfig,

    /// Timeout and polling settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Study-creation defaults
    #[serde(default)]
    pub study: StudyConfig,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the partner API
    pub base_url: String,

    /// Static API key. Takes priority over email/password and never expires.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Account email, used with `password` when no API key is set
    #[serde(default)]
    pub email: Option<String>,

    /// Account password
    #[serde(default)]
    pub password: Option<String>,

    /// Identifier sent as `client_host_id` when authenticating
    #[serde(default = "default_client_host_id")]
    pub client_host_id: String,
}

fn default_client_host_id() -> String {
    "dentiq-client".to_string()
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// General request timeout in milliseconds (default: 30s).
    /// The binary transfer deliberately carries no total timeout.
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Session-close poll interval in milliseconds (default: 2s)
    #[serde(default = "default_poll_interval")]
    pub session_poll_ms: u64,

    /// Session-close poll attempt ceiling (default: 180, ~6 minutes)
    #[serde(default = "default_poll_attempts")]
    pub session_poll_attempts: u32,

    /// Lifetime the issuer grants session tokens, in seconds (default: 24h).
    /// The credential cache refreshes one hour before this elapses.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
            session_poll_ms: default_poll_interval(),
            session_poll_attempts: default_poll_attempts(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_poll_interval() -> u64 {
    2_000 // 2 seconds
}

fn default_poll_attempts() -> u32 {
    180 // ~6 minutes at the 2s interval
}

fn default_token_lifetime() -> u64 {
    24 * 60 * 60
}

/// Study-creation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Study name recorded on the remote side
    #[serde(default = "default_study_name")]
    pub study_name: String,

    /// Study type: "CBCT", "PANORAMA", "FMX", "STL"
    #[serde(default = "default_study_type")]
    pub study_type: String,

    /// Analysis type requested after upload: "GP", "CBCT_ORTHO", ...
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            study_name: default_study_name(),
            study_type: default_study_type(),
            analysis_type: default_analysis_type(),
        }
    }
}

fn default_study_name() -> String {
    "Upload from API".to_string()
}

fn default_study_type() -> String {
    "CBCT".to_string()
}

fn default_analysis_type() -> String {
    "GP".to_string()
}

impl DentiqConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(base_url: impl Into<String>) -> DentiqConfigBuilder {
        DentiqConfigBuilder::new(base_url)
    }

    /// Whether any credential source is configured
    pub fn has_credentials(&self) -> bool {
        self.connection.api_key.is_some()
            || (self.connection.email.is_some() && self.connection.password.is_some())
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_ms)
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.connect_ms)
    }

    /// Session poll interval as a [`Duration`]
    pub fn session_poll_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.session_poll_ms)
    }

    /// Cached-token lifetime minus the one-hour safety margin.
    /// A lifetime at or below the margin degenerates to refresh-per-call.
    pub fn token_validity(&self) -> Duration {
        let lifetime = Duration::from_secs(self.timeouts.token_lifetime_secs);
        lifetime.saturating_sub(Duration::from_secs(60 * 60))
    }
}

/// Builder for DentiqConfig
pub struct DentiqConfigBuilder {
    config: DentiqConfig,
}

impl DentiqConfigBuilder {
    /// Create a new builder with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: DentiqConfig {
                connection: ConnectionConfig {
                    base_url: base_url.into(),
                    api_key: None,
                    email: None,
                    password: None,
                    client_host_id: default_client_host_id(),
                },
                timeouts: TimeoutsConfig::default(),
                study: StudyConfig::default(),
            },
        }
    }

    /// Set the static API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.connection.api_key = Some(key.into());
        self
    }

    /// Set the email/password credential pair
    pub fn credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.connection.email = Some(email.into());
        self.config.connection.password = Some(password.into());
        self
    }

    /// Set the `client_host_id` sent when authenticating
    pub fn client_host_id(mut self, id: impl Into<String>) -> Self {
        self.config.connection.client_host_id = id.into();
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set the session poll interval in milliseconds
    pub fn session_poll_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.session_poll_ms = ms;
        self
    }

    /// Set the session poll attempt ceiling
    pub fn session_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.timeouts.session_poll_attempts = attempts;
        self
    }

    /// Set the issuer token lifetime in seconds
    pub fn token_lifetime_secs(mut self, secs: u64) -> Self {
        self.config.timeouts.token_lifetime_secs = secs;
        self
    }

    /// Set the analysis type requested after upload
    pub fn analysis_type(mut self, analysis_type: impl Into<String>) -> Self {
        self.config.study.analysis_type = analysis_type.into();
        self
    }

    /// Set the study type recorded at creation
    pub fn study_type(mut self, study_type: impl Into<String>) -> Self {
        self.config.study.study_type = study_type.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> DentiqConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
connection:
  base_url: "https://partner.example.com/partner-api"
  api_key: "secret123"

timeouts:
  request_ms: 60000
  session_poll_ms: 500
"#;

        let config = DentiqConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.connection.base_url,
            "https://partner.example.com/partner-api"
        );
        assert_eq!(config.connection.api_key, Some("secret123".to_string()));
        assert_eq!(config.timeouts.request_ms, 60000);
        assert_eq!(config.timeouts.session_poll_ms, 500);
        // Unset sections take defaults
        assert_eq!(config.timeouts.session_poll_attempts, 180);
        assert_eq!(config.study.study_type, "CBCT");
    }

    #[test]
    fn test_builder() {
        let config = DentiqConfig::builder("http://localhost:9080")
            .credentials("clinic@example.com", "hunter2")
            .session_poll_ms(250)
            .session_poll_attempts(10)
            .analysis_type("CBCT_ORTHO")
            .build();

        assert_eq!(config.connection.base_url, "http://localhost:9080");
        assert_eq!(
            config.connection.email,
            Some("clinic@example.com".to_string())
        );
        assert_eq!(config.timeouts.session_poll_ms, 250);
        assert_eq!(config.timeouts.session_poll_attempts, 10);
        assert_eq!(config.study.analysis_type, "CBCT_ORTHO");
        assert!(config.has_credentials());
    }

    #[test]
    fn test_no_credentials() {
        let config = DentiqConfig::builder("http://localhost:9080").build();
        assert!(!config.has_credentials());

        // Email without password is not a usable credential source
        let mut half = DentiqConfig::builder("http://localhost:9080").build();
        half.connection.email = Some("clinic@example.com".to_string());
        assert!(!half.has_credentials());
    }

    #[test]
    fn test_token_validity_applies_margin() {
        let config = DentiqConfig::builder("http://localhost")
            .token_lifetime_secs(24 * 60 * 60)
            .build();
        assert_eq!(config.token_validity(), Duration::from_secs(23 * 60 * 60));

        // Lifetime shorter than the margin saturates to zero
        let short = DentiqConfig::builder("http://localhost")
            .token_lifetime_secs(600)
            .build();
        assert_eq!(short.token_validity(), Duration::ZERO);
    }
}

//! Configuration file handling for dentiq-cli

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Partner API base URL
    pub server: Option<String>,
    /// Static API key
    pub api_key: Option<String>,
    /// Account email
    pub email: Option<String>,
    /// Account password
    pub password: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("dentiq-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, cli: &crate::Cli) -> MergedConfig {
        MergedConfig {
            server: cli
                .server
                .clone()
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| "https://partner.dentiq.example.com/partner-api".to_string()),
            api_key: cli.api_key.clone().or_else(|| self.api_key.clone()),
            email: cli.email.clone().or_else(|| self.email.clone()),
            password: cli.password.clone().or_else(|| self.password.clone()),
            no_color: cli.no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub api_key: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
server = "https://partner.example.com/partner-api"
api_key = "secret"
"#,
        )
        .unwrap();
        assert_eq!(
            config.server.as_deref(),
            Some("https://partner.example.com/partner-api")
        );
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert!(config.email.is_none());
    }
}

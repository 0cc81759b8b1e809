//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.costpilot.toml` files and the environment. Account identifiers
//! must validate before any pipeline run starts; a validation failure
//! is fatal.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration validation errors. These abort the run before any
/// stage executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: `{field}` (set it in .costpilot.toml or via {env})")]
    Missing { field: &'static str, env: &'static str },

    #[error("invalid configuration: `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target account scope.
    #[serde(default)]
    pub account: AccountConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Report output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Account scope the pipeline runs against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Subscription to scan and analyze.
    #[serde(default)]
    pub subscription_id: String,

    /// Tenant the subscription belongs to.
    #[serde(default)]
    pub tenant_id: String,
}

/// Resource scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Management API base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Management API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Maximum number of resources to scan.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            limit: default_limit(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_api_version() -> String {
    "2021-04-01".to_string()
}

fn default_limit() -> usize {
    50
}

fn default_timeout() -> u64 {
    60
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory report files are written under, one subdirectory per
    /// session.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "reports".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".costpilot.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; options
    /// the CLI left unset keep their file values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref subscription) = args.subscription {
            self.account.subscription_id = subscription.clone();
        }
        if let Some(ref tenant) = args.tenant {
            self.account.tenant_id = tenant.clone();
        }
        if let Some(limit) = args.limit {
            self.scan.limit = limit;
        }
    }

    /// Validate the account scope. Must pass before any pipeline run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.subscription_id.is_empty() {
            return Err(ConfigError::Missing {
                field: "account.subscription_id",
                env: "AZURE_SUBSCRIPTION_ID",
            });
        }
        if !is_guid(&self.account.subscription_id) {
            return Err(ConfigError::Invalid {
                field: "account.subscription_id",
                reason: format!("`{}` is not a GUID", self.account.subscription_id),
            });
        }

        if self.account.tenant_id.is_empty() {
            return Err(ConfigError::Missing {
                field: "account.tenant_id",
                env: "AZURE_TENANT_ID",
            });
        }
        if !is_guid(&self.account.tenant_id) {
            return Err(ConfigError::Invalid {
                field: "account.tenant_id",
                reason: format!("`{}` is not a GUID", self.account.tenant_id),
            });
        }

        if !self.scan.endpoint.starts_with("http://") && !self.scan.endpoint.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                field: "scan.endpoint",
                reason: format!("`{}` is not an http(s) URL", self.scan.endpoint),
            });
        }

        if self.scan.limit == 0 {
            return Err(ConfigError::Invalid {
                field: "scan.limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scan.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "scan.timeout_seconds",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Checks the canonical 8-4-4-4-12 GUID shape.
fn is_guid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "11111111-2222-3333-4444-555555555555";
    const TEN: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.account.subscription_id = SUB.to_string();
        config.account.tenant_id = TEN.to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan.endpoint, "https://management.azure.com");
        assert_eq!(config.scan.limit, 50);
        assert_eq!(config.output.dir, "reports");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[account]
subscription_id = "11111111-2222-3333-4444-555555555555"
tenant_id = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee"

[scan]
limit = 20
timeout_seconds = 30

[output]
dir = "out"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.account.subscription_id, SUB);
        assert_eq!(config.scan.limit, 20);
        assert_eq!(config.scan.timeout_seconds, 30);
        assert_eq!(config.output.dir, "out");
        // Omitted fields keep their defaults.
        assert_eq!(config.scan.api_version, "2021-04-01");
    }

    #[test]
    fn test_is_guid() {
        assert!(is_guid(SUB));
        assert!(is_guid(TEN));
        assert!(!is_guid("not-a-guid"));
        assert!(!is_guid("11111111222233334444555555555555"));
        assert!(!is_guid("11111111-2222-3333-4444-55555555555z"));
    }

    #[test]
    fn test_validate_missing_subscription() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("subscription_id"));
        assert!(err.to_string().contains("AZURE_SUBSCRIPTION_ID"));
    }

    #[test]
    fn test_validate_rejects_malformed_tenant() {
        let mut config = valid_config();
        config.account.tenant_id = "prod-tenant".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tenant_id"));
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let mut config = valid_config();
        config.scan.endpoint = "management.azure.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scan.endpoint"));
    }

    #[test]
    fn test_validate_accepts_valid_account() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[account]"));
        assert!(toml_str.contains("[scan]"));
        assert!(toml_str.contains("[output]"));
    }
}

mod mcp;

pub use mcp::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mcp: GraphMcpConfig,
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration against the current process environment.
    pub fn validate(&self) -> Vec<ConfigError> {
        self.validate_with(|name| std::env::var(name).ok())
    }

    /// Validate with a custom environment lookup.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate_with<F>(&self, lookup: F) -> Vec<ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let mcp = &self.mcp;

        if mcp.resolve_base_url_with(&lookup).is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "mcp.base_url".into(),
                message: format!("no base URL configured and {} is unset", mcp.url_env),
            });
        }

        // The registry can still be given a key explicitly, so this is a warning.
        if mcp.resolve_api_key_with(None, &lookup).is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "mcp.api_key".into(),
                message: format!("no API key configured and {} is unset", mcp.api_key_env),
            });
        }

        if mcp.connect_timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "mcp.connect_timeout_ms".into(),
                message: "connect timeout must be greater than 0".into(),
            });
        }

        if mcp.request_timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "mcp.request_timeout_ms".into(),
                message: "request timeout must be greater than 0".into(),
            });
        }

        if mcp.client_name.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "mcp.client_name".into(),
                message: "client name must not be empty".into(),
            });
        }

        errors
    }
}

//! Secure resource manager configuration

use crate::errors::{Result, SentinelError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on a query-stripped resource URI.
pub const MAX_URI_LENGTH: usize = 256;

/// What to do with a request that arrives while a delegation is pending.
///
/// Either way the request is never evaluated and gets exactly one
/// payload-less rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyRequestPolicy {
    /// Answer with `Unauthorized`.
    #[default]
    RejectUnauthorized,
    /// Answer with `ServiceUnavailable` so the peer can retry.
    RejectUnavailable,
}

/// Runtime configuration for the secure resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrmConfig {
    /// Longest accepted resource URI, query excluded.
    pub max_uri_length: usize,
    /// Handling of requests arriving during a pending delegation.
    pub busy_request_policy: BusyRequestPolicy,
}

impl Default for SrmConfig {
    fn default() -> Self {
        Self {
            max_uri_length: MAX_URI_LENGTH,
            busy_request_policy: BusyRequestPolicy::default(),
        }
    }
}

impl SrmConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SrmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_uri_length == 0 {
            return Err(SentinelError::invalid("max_uri_length must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = SrmConfig::default();
        assert_eq!(config.max_uri_length, MAX_URI_LENGTH);
        assert_eq!(
            config.busy_request_policy,
            BusyRequestPolicy::RejectUnauthorized
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SrmConfig::from_toml_str("busy_request_policy = \"reject_unavailable\"\n")
            .unwrap();
        assert_eq!(config.max_uri_length, MAX_URI_LENGTH);
        assert_eq!(
            config.busy_request_policy,
            BusyRequestPolicy::RejectUnavailable
        );
    }

    #[test]
    fn zero_uri_length_is_rejected() {
        let err = SrmConfig::from_toml_str("max_uri_length = 0\n").unwrap_err();
        assert!(matches!(err, SentinelError::Invalid { .. }));
    }

    #[test]
    fn malformed_toml_is_invalid() {
        let err = SrmConfig::from_toml_str("max_uri_length = \"long\"").unwrap_err();
        assert!(matches!(err, SentinelError::Invalid { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_uri_length = 64").unwrap();
        let config = SrmConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_uri_length, 64);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SrmConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SentinelError::NotFound { .. }));
    }
}

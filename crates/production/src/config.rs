//! Daemon configuration loaded from TOML.

use keypool_provisioner::ProvisionerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading a [`DaemonConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level daemon configuration.
///
/// Every field has a default, so an empty file is a valid config. Durations
/// are integer milliseconds.
///
/// ```toml
/// settings_path = "/var/lib/keypool/settings.json"
/// log_filter = "info,keypool_provisioner=debug"
/// trigger_interval = 86400000
///
/// [provisioner]
/// safe_csr_batch_size = 20
/// key_generation_pause = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Runtime constants for provisioning runs.
    pub provisioner: ProvisionerConfig,

    /// JSON file holding the persisted provisioner settings.
    pub settings_path: PathBuf,

    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Jobs the worker queue holds before triggers are rejected.
    pub queue_depth: usize,

    /// Interval between periodic triggers.
    #[serde(with = "keypool_types::serde_millis")]
    pub trigger_interval: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            provisioner: ProvisionerConfig::default(),
            settings_path: PathBuf::from("keypool-settings.json"),
            log_filter: "info".to_string(),
            queue_depth: 4,
            trigger_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl DaemonConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be at least 1".into()));
        }
        if self.trigger_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "trigger_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = path.into();
        self
    }

    pub fn with_provisioner(mut self, provisioner: ProvisionerConfig) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn with_trigger_interval(mut self, interval: Duration) -> Self {
        self.trigger_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(DaemonConfig::from_toml_str("").unwrap(), DaemonConfig::default());
    }

    #[test]
    fn test_nested_provisioner_section() {
        let config = DaemonConfig::from_toml_str(
            r#"
            settings_path = "/tmp/keypool.json"
            trigger_interval = 3600000

            [provisioner]
            failure_maximum = 3
            test_mode = true
            "#,
        )
        .unwrap();

        assert_eq!(config.settings_path, PathBuf::from("/tmp/keypool.json"));
        assert_eq!(config.trigger_interval, Duration::from_secs(3600));
        assert_eq!(config.provisioner.failure_maximum, 3);
        assert!(config.provisioner.test_mode);
        assert_eq!(config.provisioner.safe_csr_batch_size.get(), 20);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            DaemonConfig::from_toml_str("queue_depth = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DaemonConfig::from_toml_str("queue_depth = \"four\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_filter = \"debug\"").unwrap();

        let config = DaemonConfig::load(file.path()).unwrap();
        assert_eq!(config.log_filter, "debug");

        assert!(matches!(
            DaemonConfig::load("/nonexistent/keypool.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}

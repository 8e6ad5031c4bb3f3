//! Configuration for provisioning runs.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Default ceiling on keys per CSR batch.
pub const DEFAULT_SAFE_CSR_BATCH_SIZE: NonZeroU32 = match NonZeroU32::new(20) {
    Some(size) => size,
    None => panic!("batch size must be non-zero"),
};

/// Runtime constants for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Maximum keys certified by a single CSR batch.
    ///
    /// Independent of how many keys are needed; bounds backend load per request.
    pub safe_csr_batch_size: NonZeroU32,

    /// Consecutive config-fetch failures tolerated before persisted
    /// configuration is reset.
    pub failure_maximum: u32,

    /// Pause between successive key generations when the pool already holds keys.
    #[serde(with = "keypool_types::serde_millis")]
    pub key_generation_pause: Duration,

    /// Expiry horizon used instead of the configured one on a metered network.
    ///
    /// Short, so that only keys about to lapse can trigger metered provisioning.
    #[serde(with = "keypool_types::serde_millis")]
    pub metered_expiration_window: Duration,

    /// Generate keys in the key store's test mode.
    pub test_mode: bool,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            safe_csr_batch_size: DEFAULT_SAFE_CSR_BATCH_SIZE,
            failure_maximum: 5,
            key_generation_pause: Duration::from_millis(1000),
            metered_expiration_window: Duration::from_secs(24 * 60 * 60),
            test_mode: false,
        }
    }
}

impl ProvisionerConfig {
    /// Set the CSR batch ceiling.
    pub fn with_batch_size(mut self, size: NonZeroU32) -> Self {
        self.safe_csr_batch_size = size;
        self
    }

    /// Set the failure threshold.
    pub fn with_failure_maximum(mut self, maximum: u32) -> Self {
        self.failure_maximum = maximum;
        self
    }

    /// Set the pause between key generations.
    pub fn with_generation_pause(mut self, pause: Duration) -> Self {
        self.key_generation_pause = pause;
        self
    }

    /// Set the metered-network expiry window.
    pub fn with_metered_window(mut self, window: Duration) -> Self {
        self.metered_expiration_window = window;
        self
    }

    /// Generate keys in test mode.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.safe_csr_batch_size.get(), 20);
        assert_eq!(config.failure_maximum, 5);
        assert_eq!(config.key_generation_pause, Duration::from_secs(1));
        assert_eq!(config.metered_expiration_window, Duration::from_secs(86_400));
        assert!(!config.test_mode);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ProvisionerConfig = toml::from_str(
            r#"
            safe_csr_batch_size = 8
            key_generation_pause = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.safe_csr_batch_size.get(), 8);
        assert_eq!(config.key_generation_pause, Duration::from_millis(250));
        assert_eq!(config.failure_maximum, 5);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result: Result<ProvisionerConfig, _> = toml::from_str("safe_csr_batch_size = 0");
        assert!(result.is_err());
    }
}

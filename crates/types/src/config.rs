//! Backend-supplied device provisioning configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffer size used until the backend supplies one.
pub const DEFAULT_EXTRA_SIGNED_KEYS: u32 = 6;

/// Expiry horizon used until the backend supplies one.
pub const DEFAULT_EXPIRING_BY: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Backend URL used until the backend supplies one.
pub const DEFAULT_REMOTE_URL: &str = "https://remoteprovisioning.googleapis.com/v1";

/// Process-wide provisioning configuration.
///
/// Fetched from the backend at the start of a run and persisted immediately.
/// A later run that skips the fetch (metered network) reads the persisted copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Spare attested keys to keep on top of the keys currently in use.
    ///
    /// Zero means provisioning is administratively disabled.
    pub extra_signed_keys_available: u32,

    /// How far ahead of now to look for expiring certificates.
    #[serde(with = "crate::serde_millis")]
    pub expiring_by: Duration,

    /// Endorsement backend base URL.
    pub remote_url: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            extra_signed_keys_available: DEFAULT_EXTRA_SIGNED_KEYS,
            expiring_by: DEFAULT_EXPIRING_BY,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
        }
    }
}

impl ProvisioningConfig {
    /// Create a config with a custom buffer size.
    pub fn with_extra_keys(extra_signed_keys_available: u32) -> Self {
        Self {
            extra_signed_keys_available,
            ..Default::default()
        }
    }

    /// Set the expiry horizon.
    pub fn with_expiring_by(mut self, expiring_by: Duration) -> Self {
        self.expiring_by = expiring_by;
        self
    }

    /// Set the backend URL.
    pub fn with_remote_url(mut self, remote_url: impl Into<String>) -> Self {
        self.remote_url = remote_url.into();
        self
    }

    /// Whether the backend has turned provisioning off for this device.
    pub fn is_provisioning_disabled(&self) -> bool {
        self.extra_signed_keys_available == 0
    }
}

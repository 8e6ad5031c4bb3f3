//! Typed view over the persisted settings store.

use keypool_core::SettingsStore;
use keypool_types::{ProvisioningConfig, RunId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const KEY_EXTRA_SIGNED_KEYS: &str = "extra_signed_keys_available";
const KEY_EXPIRING_BY_MS: &str = "expiring_by_ms";
const KEY_REMOTE_URL: &str = "remote_url";
const KEY_FAILURE_COUNTER: &str = "failure_counter";
const KEY_RUN_ID: &str = "provisioning_run_id";

/// Keys cleared together by a reset. The run id survives.
const RESET_KEYS: [&str; 4] = [
    KEY_EXTRA_SIGNED_KEYS,
    KEY_EXPIRING_BY_MS,
    KEY_REMOTE_URL,
    KEY_FAILURE_COUNTER,
];

/// Durable provisioner state: device config, failure counter and run id.
///
/// Missing or unparseable values read as their defaults. Write failures are
/// logged and otherwise ignored, so callers never fail on persistence.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn SettingsStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Persisted device config, with defaults for anything not yet stored.
    pub fn device_config(&self) -> ProvisioningConfig {
        let defaults = ProvisioningConfig::default();
        ProvisioningConfig {
            extra_signed_keys_available: self
                .read(KEY_EXTRA_SIGNED_KEYS)
                .unwrap_or(defaults.extra_signed_keys_available),
            expiring_by: self
                .read(KEY_EXPIRING_BY_MS)
                .map(Duration::from_millis)
                .unwrap_or(defaults.expiring_by),
            remote_url: self.store.get(KEY_REMOTE_URL).unwrap_or(defaults.remote_url),
        }
    }

    /// Persist a freshly fetched device config in one write.
    pub fn set_device_config(&self, config: &ProvisioningConfig) {
        let millis = u64::try_from(config.expiring_by.as_millis()).unwrap_or(u64::MAX);
        let entries = [
            (
                KEY_EXTRA_SIGNED_KEYS,
                config.extra_signed_keys_available.to_string(),
            ),
            (KEY_EXPIRING_BY_MS, millis.to_string()),
            (KEY_REMOTE_URL, config.remote_url.clone()),
        ];
        if let Err(e) = self.store.put_many(&entries) {
            warn!(error = %e, "Failed to persist device config");
        }
    }

    pub fn failure_counter(&self) -> u32 {
        self.read(KEY_FAILURE_COUNTER).unwrap_or(0)
    }

    /// Increment the failure counter and return the new value.
    pub fn increment_failure_counter(&self) -> u32 {
        let count = self.failure_counter().saturating_add(1);
        self.write(KEY_FAILURE_COUNTER, count.to_string());
        count
    }

    pub fn clear_failure_counter(&self) {
        if let Err(e) = self.store.remove(&[KEY_FAILURE_COUNTER]) {
            warn!(error = %e, "Failed to clear failure counter");
        }
    }

    /// Remove the device config and the failure counter in one write.
    pub fn clear_all(&self) {
        if let Err(e) = self.store.remove(&RESET_KEYS) {
            warn!(error = %e, "Failed to clear persisted settings");
        }
    }

    /// Last run id handed out, or zero before the first run.
    pub fn run_id(&self) -> RunId {
        RunId(self.read(KEY_RUN_ID).unwrap_or(0))
    }

    /// Increment and persist the run id.
    pub fn next_run_id(&self) -> RunId {
        let id = self.run_id().next();
        self.write(KEY_RUN_ID, id.as_u64().to_string());
        id
    }

    fn read<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable setting");
                None
            }
        }
    }

    fn write(&self, key: &str, value: String) {
        if let Err(e) = self.store.put(key, value) {
            warn!(key, error = %e, "Failed to persist setting");
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("device_config", &self.device_config())
            .field("failure_counter", &self.failure_counter())
            .field("run_id", &self.run_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypool_core::{MemorySettingsStore, StoreError};

    fn settings() -> (Arc<MemorySettingsStore>, Settings) {
        let store = Arc::new(MemorySettingsStore::new());
        (store.clone(), Settings::new(store))
    }

    #[test]
    fn test_defaults_before_first_fetch() {
        let (_, settings) = settings();
        assert_eq!(settings.device_config(), ProvisioningConfig::default());
        assert_eq!(settings.failure_counter(), 0);
        assert_eq!(settings.run_id(), RunId(0));
    }

    #[test]
    fn test_device_config_persists() {
        let (store, settings) = settings();
        let config = ProvisioningConfig::with_extra_keys(11)
            .with_expiring_by(Duration::from_secs(3600))
            .with_remote_url("https://backend.test/v1");
        settings.set_device_config(&config);

        // A second view over the same store sees the same values.
        let reopened = Settings::new(store);
        assert_eq!(reopened.device_config(), config);
    }

    #[test]
    fn test_clear_all_keeps_run_id() {
        let (store, settings) = settings();
        settings.set_device_config(&ProvisioningConfig::with_extra_keys(3));
        settings.increment_failure_counter();
        settings.next_run_id();
        settings.next_run_id();

        settings.clear_all();

        assert_eq!(settings.device_config(), ProvisioningConfig::default());
        assert_eq!(settings.failure_counter(), 0);
        assert_eq!(settings.run_id(), RunId(2));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_unparseable_value_reads_as_default() {
        let (store, settings) = settings();
        store.put(KEY_EXTRA_SIGNED_KEYS, "lots".into()).unwrap();
        assert_eq!(settings.device_config().extra_signed_keys_available, 6);
    }

    struct ReadOnlyStore;

    impl SettingsStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
            Err(StoreError::Io("read-only".into()))
        }

        fn put_many(&self, _entries: &[(&str, String)]) -> Result<(), StoreError> {
            Err(StoreError::Io("read-only".into()))
        }

        fn remove(&self, _keys: &[&str]) -> Result<(), StoreError> {
            Err(StoreError::Io("read-only".into()))
        }
    }

    #[test]
    fn test_write_failures_do_not_propagate() {
        let settings = Settings::new(Arc::new(ReadOnlyStore));
        assert_eq!(settings.increment_failure_counter(), 1);
        settings.clear_all();
        settings.set_device_config(&ProvisioningConfig::with_extra_keys(3));
        assert_eq!(settings.next_run_id(), RunId(1));
    }
}

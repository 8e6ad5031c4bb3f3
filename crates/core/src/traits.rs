//! Collaborator ports consumed by the provisioner.

use crate::{EndorsementError, KeyStoreError, StoreError};
use keypool_types::{CsrBatch, DeviceConfigResponse, ImplInfo, PoolStatus, SecurityLevel};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Reports pool counters per security level.
pub trait PoolStatusSource: Send + Sync {
    /// Get a snapshot of `level`'s pool.
    ///
    /// # Arguments
    ///
    /// * `expiring_by` - Horizon as a duration since the Unix epoch. Attested keys whose
    ///   certificate expires before this instant are counted as `expiring`.
    /// * `level` - The security level to query
    fn get_pool_status(
        &self,
        expiring_by: Duration,
        level: SecurityLevel,
    ) -> Result<PoolStatus, KeyStoreError>;
}

/// Generates and deletes keys in the secure-element backed key store.
pub trait KeyStoreClient: Send + Sync {
    /// Generate one unattested key pair for `level`.
    fn generate_key_pair(&self, test_mode: bool, level: SecurityLevel)
        -> Result<(), KeyStoreError>;

    /// Delete every key of every level.
    fn delete_all_keys(&self) -> Result<(), KeyStoreError>;

    /// Enumerate the security levels the key store exposes, in its own order.
    fn list_supported_levels(&self) -> Result<Vec<ImplInfo>, KeyStoreError>;
}

/// A key store handle offering both pool queries and key management.
pub trait KeyStoreService: PoolStatusSource + KeyStoreClient {}

impl<T: PoolStatusSource + KeyStoreClient + ?Sized> KeyStoreService for T {}

/// Resolves the key store handle.
///
/// Returns `None` when the service is not registered, which ends the run
/// with `ServiceUnavailable`.
pub trait KeyStoreConnector: Send + Sync {
    fn connect(&self) -> Option<Arc<dyn KeyStoreService>>;
}

/// Remote endorsement backend.
pub trait EndorsementClient: Send + Sync {
    /// Fetch the device configuration together with this run's endorsement
    /// chains and challenge.
    fn fetch_device_config(&self) -> Result<DeviceConfigResponse, EndorsementError>;

    /// Certify `batch.count()` unattested keys of `batch.level()`.
    fn certify_batch(&self, batch: &CsrBatch) -> Result<(), EndorsementError>;
}

/// Reports whether the active network connection is metered.
pub trait NetworkConditionProbe: Send + Sync {
    fn is_metered(&self) -> bool;
}

/// Durable string key-value storage for provisioner state.
///
/// Values survive process restarts. Reads never fail; a missing or unreadable
/// key reads as `None`.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Store every entry in one write: either all land or none do.
    fn put_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError>;

    /// Remove the given keys in one write.
    fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Time source and the blocking pause used between key generations.
pub trait Clock: Send + Sync {
    /// Current wall-clock time as a duration since the Unix epoch.
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by the system clock and `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

//! Simulated key store.

use keypool_core::{KeyStoreClient, KeyStoreConnector, KeyStoreError, KeyStoreService, PoolStatusSource};
use keypool_types::{ImplInfo, PoolStatus, SecurityLevel};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct SimKey {
    /// Certificate expiry; `None` until the backend certifies the key.
    expires_at: Option<Duration>,
    assigned: bool,
}

impl SimKey {
    fn is_attested(&self) -> bool {
        self.expires_at.is_some()
    }
}

/// Call counters, for assertions and stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStoreCounters {
    pub generated: u64,
    pub delete_all_calls: u64,
    pub status_queries: u64,
    pub level_listings: u64,
}

#[derive(Debug, Default)]
struct KeyStoreState {
    levels: Vec<ImplInfo>,
    keys: BTreeMap<SecurityLevel, Vec<SimKey>>,
    /// Generations still allowed before every further one fails.
    generation_budget: Option<u32>,
    fail_status_queries: bool,
    counters: KeyStoreCounters,
}

/// In-memory key store with per-level pools.
///
/// Pool counters are derived from the stored keys on every query, so the
/// snapshot invariants hold by construction.
#[derive(Debug, Default)]
pub struct SimKeyStore {
    state: Mutex<KeyStoreState>,
}

impl SimKeyStore {
    /// Create a key store exposing `levels`, in that order.
    pub fn new(levels: Vec<ImplInfo>) -> Self {
        let keys = levels
            .iter()
            .map(|info| (info.security_level, Vec::new()))
            .collect();
        Self {
            state: Mutex::new(KeyStoreState {
                levels,
                keys,
                ..Default::default()
            }),
        }
    }

    /// Add `count` certified keys expiring at `expires_at`.
    pub fn add_attested(&self, level: SecurityLevel, count: u32, expires_at: Duration) {
        let mut state = self.state.lock();
        let pool = state.keys.entry(level).or_default();
        pool.extend((0..count).map(|_| SimKey {
            expires_at: Some(expires_at),
            assigned: false,
        }));
    }

    /// Add `count` generated but uncertified keys.
    pub fn add_unattested(&self, level: SecurityLevel, count: u32) {
        let mut state = self.state.lock();
        let pool = state.keys.entry(level).or_default();
        pool.extend((0..count).map(|_| SimKey {
            expires_at: None,
            assigned: false,
        }));
    }

    /// Hand one unassigned attested key to a caller.
    ///
    /// Returns false if the pool has none left.
    pub fn assign_key(&self, level: SecurityLevel) -> bool {
        let mut state = self.state.lock();
        let Some(pool) = state.keys.get_mut(&level) else {
            return false;
        };
        match pool.iter_mut().find(|k| k.is_attested() && !k.assigned) {
            Some(key) => {
                key.assigned = true;
                true
            }
            None => false,
        }
    }

    /// Mark up to `count` unattested keys as certified until `expires_at`.
    ///
    /// Returns how many keys were certified.
    pub fn certify(&self, level: SecurityLevel, count: u32, expires_at: Duration) -> u32 {
        let mut state = self.state.lock();
        let Some(pool) = state.keys.get_mut(&level) else {
            return 0;
        };
        let mut certified = 0;
        for key in pool.iter_mut().filter(|k| !k.is_attested()) {
            if certified == count {
                break;
            }
            key.expires_at = Some(expires_at);
            certified += 1;
        }
        certified
    }

    /// Drop every key whose certificate expired at or before `now`.
    pub fn prune_expired(&self, now: Duration) -> u32 {
        let mut state = self.state.lock();
        let mut pruned = 0;
        for pool in state.keys.values_mut() {
            let before = pool.len();
            pool.retain(|k| k.expires_at.map_or(true, |at| at > now));
            pruned += (before - pool.len()) as u32;
        }
        pruned
    }

    /// Snapshot without touching the counters.
    pub fn status_at(&self, level: SecurityLevel, expiring_by: Duration) -> PoolStatus {
        let state = self.state.lock();
        state
            .keys
            .get(&level)
            .map(|pool| snapshot(pool, expiring_by))
            .unwrap_or(PoolStatus::EMPTY)
    }

    /// Allow `remaining` more generations, then fail every one after.
    pub fn fail_generation_after(&self, remaining: u32) {
        self.state.lock().generation_budget = Some(remaining);
    }

    pub fn set_fail_status_queries(&self, fail: bool) {
        self.state.lock().fail_status_queries = fail;
    }

    pub fn counters(&self) -> KeyStoreCounters {
        self.state.lock().counters
    }

    pub fn key_count(&self) -> usize {
        self.state.lock().keys.values().map(Vec::len).sum()
    }
}

fn snapshot(pool: &[SimKey], expiring_by: Duration) -> PoolStatus {
    let mut status = PoolStatus::EMPTY;
    for key in pool {
        status.total += 1;
        let Some(expires_at) = key.expires_at else {
            continue;
        };
        status.attested += 1;
        if !key.assigned {
            status.unassigned += 1;
        }
        if expires_at < expiring_by {
            status.expiring += 1;
        }
    }
    status
}

impl PoolStatusSource for SimKeyStore {
    fn get_pool_status(
        &self,
        expiring_by: Duration,
        level: SecurityLevel,
    ) -> Result<PoolStatus, KeyStoreError> {
        let mut state = self.state.lock();
        state.counters.status_queries += 1;
        if state.fail_status_queries {
            return Err(KeyStoreError::Service("pool status unavailable".into()));
        }
        let status = state
            .keys
            .get(&level)
            .map(|pool| snapshot(pool, expiring_by))
            .unwrap_or(PoolStatus::EMPTY);
        trace!(%level, %status, "Pool status queried");
        Ok(status)
    }
}

impl KeyStoreClient for SimKeyStore {
    fn generate_key_pair(&self, _test_mode: bool, level: SecurityLevel) -> Result<(), KeyStoreError> {
        let mut state = self.state.lock();
        if let Some(budget) = state.generation_budget.as_mut() {
            if *budget == 0 {
                return Err(KeyStoreError::Service("key generation failed".into()));
            }
            *budget -= 1;
        }
        if !state.levels.iter().any(|info| info.security_level == level) {
            return Err(KeyStoreError::Service(format!("{level} not supported")));
        }
        state.keys.entry(level).or_default().push(SimKey {
            expires_at: None,
            assigned: false,
        });
        state.counters.generated += 1;
        Ok(())
    }

    fn delete_all_keys(&self) -> Result<(), KeyStoreError> {
        let mut state = self.state.lock();
        state.counters.delete_all_calls += 1;
        for pool in state.keys.values_mut() {
            pool.clear();
        }
        Ok(())
    }

    fn list_supported_levels(&self) -> Result<Vec<ImplInfo>, KeyStoreError> {
        let mut state = self.state.lock();
        state.counters.level_listings += 1;
        Ok(state.levels.clone())
    }
}

/// [`KeyStoreConnector`] that can simulate an unregistered service.
#[derive(Debug)]
pub struct SimConnector {
    key_store: Arc<SimKeyStore>,
    available: AtomicBool,
    connects: AtomicU64,
}

impl SimConnector {
    pub fn new(key_store: Arc<SimKeyStore>) -> Self {
        Self {
            key_store,
            available: AtomicBool::new(true),
            connects: AtomicU64::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }
}

impl KeyStoreConnector for SimConnector {
    fn connect(&self) -> Option<Arc<dyn KeyStoreService>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.key_store.clone() as Arc<dyn KeyStoreService>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypool_test_helpers::{status, strongbox, tee};

    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[test]
    fn test_status_derived_from_keys() {
        let store = SimKeyStore::new(vec![tee(), strongbox()]);
        let level = SecurityLevel::TrustedEnvironment;
        store.add_attested(level, 3, HOUR);
        store.add_attested(level, 2, 10 * HOUR);
        store.add_unattested(level, 4);
        assert!(store.assign_key(level));

        assert_eq!(store.status_at(level, 2 * HOUR), status(9, 5, 4, 3));
        assert_eq!(
            store.status_at(SecurityLevel::StrongBox, HOUR),
            PoolStatus::EMPTY
        );
    }

    #[test]
    fn test_certify_and_prune() {
        let store = SimKeyStore::new(vec![tee()]);
        let level = SecurityLevel::TrustedEnvironment;
        store.add_unattested(level, 3);

        assert_eq!(store.certify(level, 5, HOUR), 3);
        assert_eq!(store.status_at(level, Duration::ZERO), status(3, 3, 3, 0));

        assert_eq!(store.prune_expired(HOUR), 3);
        assert_eq!(store.key_count(), 0);
    }

    #[test]
    fn test_generation_budget() {
        let store = SimKeyStore::new(vec![tee()]);
        let level = SecurityLevel::TrustedEnvironment;
        store.fail_generation_after(1);

        assert!(store.generate_key_pair(false, level).is_ok());
        assert!(store.generate_key_pair(false, level).is_err());
        assert_eq!(store.counters().generated, 1);
    }

    #[test]
    fn test_connector_availability() {
        let connector = SimConnector::new(Arc::new(SimKeyStore::new(vec![tee()])));
        assert!(connector.connect().is_some());

        connector.set_available(false);
        assert!(connector.connect().is_none());
        assert_eq!(connector.connects(), 2);
    }
}

//! Consecutive config-fetch failure tracking.

use crate::Settings;
use keypool_core::{EndorsementClient, RunOutcome};
use keypool_types::DeviceConfigResponse;
use tracing::{debug, error, info, warn};

/// Device config fetch that failed and was recorded by a [`FailureTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchFailure {
    /// Consecutive failures including this one.
    pub failures: u32,
    /// Whether this failure wiped the persisted configuration.
    pub reset: bool,
}

impl From<FetchFailure> for RunOutcome {
    fn from(f: FetchFailure) -> Self {
        RunOutcome::ConfigFetchFailed {
            failures: f.failures,
            reset: f.reset,
        }
    }
}

/// Circuit breaker over a backend that keeps failing.
///
/// Counts consecutive device config fetch failures in persisted settings.
/// Once the count exceeds the maximum, all persisted configuration is wiped so
/// the next run behaves as if the device was never provisioned.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    settings: Settings,
    maximum: u32,
}

impl FailureTracker {
    pub fn new(settings: Settings, maximum: u32) -> Self {
        Self { settings, maximum }
    }

    /// Record one failure and return the consecutive count.
    pub fn record_failure(&self) -> u32 {
        let count = self.settings.increment_failure_counter();
        info!(failures = count, maximum = self.maximum, "Recorded config fetch failure");
        count
    }

    /// Record a successful fetch, restarting the consecutive count.
    pub fn record_success(&self) {
        if self.settings.failure_counter() != 0 {
            self.settings.clear_failure_counter();
        }
    }

    pub fn current_count(&self) -> u32 {
        self.settings.failure_counter()
    }

    /// True once the consecutive count exceeds the maximum.
    pub fn should_reset(&self) -> bool {
        self.current_count() > self.maximum
    }

    /// Clear the counter and every persisted config field together.
    pub fn reset_all(&self) {
        error!(
            failures = self.current_count(),
            "Too many device config failures, resetting persisted configuration"
        );
        self.settings.clear_all();
    }

    /// Record a failure and reset if it crossed the threshold.
    ///
    /// Returns the count after this failure and whether a reset happened.
    pub fn on_fetch_failure(&self) -> (u32, bool) {
        let count = self.record_failure();
        if self.should_reset() {
            self.reset_all();
            return (count, true);
        }
        (count, false)
    }

    /// Fetch the device config through `endorsement`.
    ///
    /// A success restarts the failure count and persists the config before it
    /// is returned. A failure is counted and may reset persisted state.
    pub fn fetch_device_config(
        &self,
        endorsement: &dyn EndorsementClient,
    ) -> Result<DeviceConfigResponse, FetchFailure> {
        match endorsement.fetch_device_config() {
            Ok(response) => {
                self.record_success();
                self.settings.set_device_config(&response.config);
                debug!(
                    extra = response.config.extra_signed_keys_available,
                    expiring_by = ?response.config.expiring_by,
                    "Persisted device config"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "Device config fetch failed");
                let (failures, reset) = self.on_fetch_failure();
                Err(FetchFailure { failures, reset })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypool_core::{EndorsementError, MemorySettingsStore};
    use keypool_types::{Challenge, CsrBatch, ProvisioningConfig};
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Arc;
    use tracing_test::traced_test;

    /// Serves scripted fetch results, then the given config.
    struct ScriptedBackend {
        config: ProvisioningConfig,
        fail_next: Mutex<VecDeque<bool>>,
    }

    impl EndorsementClient for ScriptedBackend {
        fn fetch_device_config(&self) -> Result<DeviceConfigResponse, EndorsementError> {
            if self.fail_next.lock().pop_front().unwrap_or(false) {
                return Err(EndorsementError::Network("unreachable".into()));
            }
            Ok(DeviceConfigResponse {
                config: self.config.clone(),
                endorsement_chains: BTreeMap::new(),
                challenge: Challenge(vec![7]),
            })
        }

        fn certify_batch(&self, _batch: &CsrBatch) -> Result<(), EndorsementError> {
            Ok(())
        }
    }

    fn tracker(maximum: u32) -> (Settings, FailureTracker) {
        let settings = Settings::new(Arc::new(MemorySettingsStore::new()));
        (settings.clone(), FailureTracker::new(settings, maximum))
    }

    #[test]
    fn test_counts_consecutive_failures() {
        let (_, tracker) = tracker(5);
        assert_eq!(tracker.record_failure(), 1);
        assert_eq!(tracker.record_failure(), 2);
        assert!(!tracker.should_reset());

        tracker.record_success();
        assert_eq!(tracker.current_count(), 0);
    }

    #[test]
    #[traced_test]
    fn test_reset_after_maximum_plus_one() {
        let (settings, tracker) = tracker(5);
        settings.set_device_config(&ProvisioningConfig::with_extra_keys(12));

        for expected in 1..=5 {
            assert_eq!(tracker.on_fetch_failure(), (expected, false));
        }
        assert_eq!(settings.device_config().extra_signed_keys_available, 12);

        assert_eq!(tracker.on_fetch_failure(), (6, true));
        assert_eq!(tracker.current_count(), 0);
        assert_eq!(settings.device_config(), ProvisioningConfig::default());
        assert!(logs_contain("resetting persisted configuration"));
    }

    #[test]
    fn test_zero_maximum_resets_on_first_failure() {
        let (_, tracker) = tracker(0);
        assert_eq!(tracker.on_fetch_failure(), (1, true));
    }

    #[test]
    fn test_fetch_counts_failures_then_persists_config() {
        let (settings, tracker) = tracker(5);
        let backend = ScriptedBackend {
            config: ProvisioningConfig::with_extra_keys(9),
            fail_next: Mutex::new(VecDeque::from([true, true])),
        };

        assert_eq!(
            tracker.fetch_device_config(&backend).unwrap_err(),
            FetchFailure {
                failures: 1,
                reset: false
            }
        );
        let failure = tracker.fetch_device_config(&backend).unwrap_err();
        assert_eq!(
            RunOutcome::from(failure),
            RunOutcome::ConfigFetchFailed {
                failures: 2,
                reset: false
            }
        );
        assert_eq!(settings.device_config(), ProvisioningConfig::default());

        let response = tracker.fetch_device_config(&backend).unwrap();
        assert_eq!(response.config.extra_signed_keys_available, 9);
        assert_eq!(tracker.current_count(), 0);
        assert_eq!(settings.device_config(), backend.config);
    }
}

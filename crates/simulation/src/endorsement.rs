//! Simulated remote endorsement backend.

use crate::{SimClock, SimKeyStore};
use keypool_core::{Clock, EndorsementClient, EndorsementError};
use keypool_types::{
    Challenge, CsrBatch, DeviceConfigResponse, EcCurve, EndorsementChain, ProvisioningConfig,
};
use parking_lot::Mutex;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default certificate lifetime handed out by the backend.
const DEFAULT_CERT_VALIDITY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Call counters, for assertions and stats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndorsementCounters {
    pub fetch_calls: u64,
    pub fetch_failures: u64,
    pub certify_calls: u64,
    pub certify_failures: u64,
    pub certified_keys: u64,
    /// Size of every accepted batch, in order.
    pub batch_sizes: Vec<u32>,
}

struct BackendState {
    config: ProvisioningConfig,
    cert_validity: Duration,
    /// Scripted fetch results, consumed before the random failure rate applies.
    fetch_script: VecDeque<bool>,
    fetch_failure_rate: f64,
    /// 1-based certify call numbers that fail.
    failing_certify_calls: BTreeSet<u64>,
    missing_curves: BTreeSet<EcCurve>,
    rng: ChaCha8Rng,
    counters: EndorsementCounters,
}

/// [`EndorsementClient`] that certifies keys directly in a [`SimKeyStore`].
///
/// Failures are injected either from a script or at a seeded random rate.
pub struct SimEndorsementBackend {
    key_store: Arc<SimKeyStore>,
    clock: Arc<SimClock>,
    state: Mutex<BackendState>,
}

impl SimEndorsementBackend {
    pub fn new(key_store: Arc<SimKeyStore>, clock: Arc<SimClock>, seed: u64) -> Self {
        Self {
            key_store,
            clock,
            state: Mutex::new(BackendState {
                config: ProvisioningConfig::default(),
                cert_validity: DEFAULT_CERT_VALIDITY,
                fetch_script: VecDeque::new(),
                fetch_failure_rate: 0.0,
                failing_certify_calls: BTreeSet::new(),
                missing_curves: BTreeSet::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
                counters: EndorsementCounters::default(),
            }),
        }
    }

    /// Config served by subsequent fetches.
    pub fn set_config(&self, config: ProvisioningConfig) {
        self.state.lock().config = config;
    }

    pub fn set_extra_keys(&self, extra: u32) {
        self.state.lock().config.extra_signed_keys_available = extra;
    }

    pub fn set_cert_validity(&self, validity: Duration) {
        self.state.lock().cert_validity = validity;
    }

    /// Fail the next `count` config fetches.
    pub fn fail_next_fetches(&self, count: usize) {
        let mut state = self.state.lock();
        state.fetch_script.extend(std::iter::repeat(true).take(count));
    }

    /// Fail each unscripted fetch with probability `rate`.
    pub fn set_fetch_failure_rate(&self, rate: f64) {
        self.state.lock().fetch_failure_rate = rate.clamp(0.0, 1.0);
    }

    /// Fail the `call`th certify request (1-based, counted over the backend's lifetime).
    pub fn fail_certify_call(&self, call: u64) {
        self.state.lock().failing_certify_calls.insert(call);
    }

    /// Stop issuing an endorsement chain for `curve`.
    pub fn drop_chain(&self, curve: EcCurve) {
        self.state.lock().missing_curves.insert(curve);
    }

    pub fn counters(&self) -> EndorsementCounters {
        self.state.lock().counters.clone()
    }
}

fn chain_for(curve: EcCurve) -> EndorsementChain {
    let tag = match curve {
        EcCurve::P256 => 0x01,
        EcCurve::Curve25519 => 0x02,
    };
    EndorsementChain(vec![0x30, 0x82, tag, 0x00])
}

impl EndorsementClient for SimEndorsementBackend {
    fn fetch_device_config(&self) -> Result<DeviceConfigResponse, EndorsementError> {
        let mut state = self.state.lock();
        state.counters.fetch_calls += 1;

        let fail = match state.fetch_script.pop_front() {
            Some(fail) => fail,
            None => {
                let rate = state.fetch_failure_rate;
                rate > 0.0 && state.rng.gen_bool(rate)
            }
        };
        if fail {
            state.counters.fetch_failures += 1;
            return Err(EndorsementError::Network("connection reset".into()));
        }

        let mut challenge = vec![0u8; 16];
        state.rng.fill_bytes(&mut challenge);
        let endorsement_chains = [EcCurve::P256, EcCurve::Curve25519]
            .into_iter()
            .filter(|curve| !state.missing_curves.contains(curve))
            .map(|curve| (curve, chain_for(curve)))
            .collect();

        Ok(DeviceConfigResponse {
            config: state.config.clone(),
            endorsement_chains,
            challenge: Challenge(challenge),
        })
    }

    fn certify_batch(&self, batch: &CsrBatch) -> Result<(), EndorsementError> {
        let mut state = self.state.lock();
        state.counters.certify_calls += 1;
        let call = state.counters.certify_calls;

        if state.failing_certify_calls.contains(&call) {
            state.counters.certify_failures += 1;
            return Err(EndorsementError::Network(format!("certify call {call} dropped")));
        }

        let level = batch.level();
        let available = self.key_store.status_at(level, Duration::ZERO).unattested();
        if available < batch.count() {
            state.counters.certify_failures += 1;
            return Err(EndorsementError::Rejected(format!(
                "batch of {} keys but only {available} unattested",
                batch.count()
            )));
        }

        let expires_at = self.clock.now().saturating_add(state.cert_validity);
        let certified = self.key_store.certify(level, batch.count(), expires_at);
        state.counters.certified_keys += u64::from(certified);
        state.counters.batch_sizes.push(certified);
        debug!(%level, certified, "Simulated backend certified batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypool_core::KeyStoreClient;
    use keypool_test_helpers::tee;
    use keypool_types::SecurityLevel;
    use std::num::NonZeroU32;

    fn backend() -> (Arc<SimKeyStore>, SimEndorsementBackend) {
        let key_store = Arc::new(SimKeyStore::new(vec![tee()]));
        let backend = SimEndorsementBackend::new(key_store.clone(), Arc::new(SimClock::new()), 7);
        (key_store, backend)
    }

    fn batch(count: u32) -> CsrBatch {
        CsrBatch::new(
            SecurityLevel::TrustedEnvironment,
            count,
            chain_for(EcCurve::Curve25519),
            Challenge(vec![1]),
            NonZeroU32::new(20).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_scripted_fetch_failures() {
        let (_, backend) = backend();
        backend.fail_next_fetches(2);

        assert!(backend.fetch_device_config().is_err());
        assert!(backend.fetch_device_config().is_err());
        assert!(backend.fetch_device_config().is_ok());
        assert_eq!(backend.counters().fetch_failures, 2);
    }

    #[test]
    fn test_same_seed_same_challenges() {
        let (_, a) = backend();
        let (_, b) = backend();
        assert_eq!(
            a.fetch_device_config().unwrap().challenge,
            b.fetch_device_config().unwrap().challenge
        );
    }

    #[test]
    fn test_certify_requires_unattested_keys() {
        let (key_store, backend) = backend();
        for _ in 0..3 {
            key_store
                .generate_key_pair(false, SecurityLevel::TrustedEnvironment)
                .unwrap();
        }

        assert!(matches!(
            backend.certify_batch(&batch(4)),
            Err(EndorsementError::Rejected(_))
        ));
        assert!(backend.certify_batch(&batch(3)).is_ok());
        assert_eq!(backend.counters().certified_keys, 3);
    }

    #[test]
    fn test_missing_chain() {
        let (_, backend) = backend();
        backend.drop_chain(EcCurve::P256);

        let response = backend.fetch_device_config().unwrap();
        assert!(response.chain_for(EcCurve::P256).is_none());
        assert!(response.chain_for(EcCurve::Curve25519).is_some());
    }
}

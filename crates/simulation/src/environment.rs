//! Wiring of simulated collaborators.

use crate::{SimClock, SimConnector, SimEndorsementBackend, SimKeyStore, SimNetwork};
use keypool_core::MemorySettingsStore;
use keypool_provisioner::{Collaborators, Provisioner, ProvisionerConfig, Settings};
use keypool_types::ImplInfo;
use std::sync::Arc;

/// Every simulated collaborator, sharing one key store and clock.
///
/// Handles stay accessible after building a [`Provisioner`] so tests can
/// script failures and inspect counters.
#[derive(Clone)]
pub struct SimEnvironment {
    pub key_store: Arc<SimKeyStore>,
    pub connector: Arc<SimConnector>,
    pub endorsement: Arc<SimEndorsementBackend>,
    pub network: Arc<SimNetwork>,
    pub settings: Arc<MemorySettingsStore>,
    pub clock: Arc<SimClock>,
}

impl SimEnvironment {
    /// Build an environment exposing `levels` on an unmetered network.
    pub fn new(levels: Vec<ImplInfo>, seed: u64) -> Self {
        let key_store = Arc::new(SimKeyStore::new(levels));
        let clock = Arc::new(SimClock::new());
        Self {
            connector: Arc::new(SimConnector::new(key_store.clone())),
            endorsement: Arc::new(SimEndorsementBackend::new(
                key_store.clone(),
                clock.clone(),
                seed,
            )),
            network: Arc::new(SimNetwork::new(false)),
            settings: Arc::new(MemorySettingsStore::new()),
            key_store,
            clock,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            key_store: self.connector.clone(),
            endorsement: self.endorsement.clone(),
            network: self.network.clone(),
            settings: self.settings.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn provisioner(&self, config: ProvisionerConfig) -> Provisioner {
        Provisioner::new(config, self.collaborators())
    }

    /// Typed view over the simulated settings store.
    pub fn typed_settings(&self) -> Settings {
        Settings::new(self.settings.clone())
    }
}

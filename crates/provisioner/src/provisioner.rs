//! Entry point that serializes provisioning work.

use crate::{PoolRefill, ProvisionerConfig, ProvisioningRun, Settings};
use keypool_core::{
    Clock, EndorsementClient, KeyStoreConnector, NetworkConditionProbe, RunOutcome, RunReport,
    SettingsStore,
};
use keypool_types::SecurityLevel;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Everything a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub key_store: Arc<dyn KeyStoreConnector>,
    pub endorsement: Arc<dyn EndorsementClient>,
    pub network: Arc<dyn NetworkConditionProbe>,
    pub settings: Arc<dyn SettingsStore>,
    pub clock: Arc<dyn Clock>,
}

/// Runs provisioning work one job at a time.
///
/// Periodic runs and on-demand refills share a single guard, so at most one of
/// them touches the key store and persisted settings at any moment.
pub struct Provisioner {
    config: ProvisionerConfig,
    collaborators: Collaborators,
    run_guard: Mutex<()>,
}

impl Provisioner {
    pub fn new(config: ProvisionerConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            run_guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Typed view over the persisted settings.
    pub fn settings(&self) -> Settings {
        Settings::new(self.collaborators.settings.clone())
    }

    /// Execute one periodic run, waiting for any run in flight to finish.
    pub fn run(&self) -> RunReport {
        let _guard = self.run_guard.lock();
        ProvisioningRun::new(&self.config, &self.collaborators).execute()
    }

    /// Execute one periodic run unless another job is in flight.
    ///
    /// Returns `None` without doing anything if the guard is held.
    pub fn try_run(&self) -> Option<RunReport> {
        let Some(_guard) = self.run_guard.try_lock() else {
            debug!("Provisioning already in flight, skipping run");
            return None;
        };
        Some(ProvisioningRun::new(&self.config, &self.collaborators).execute())
    }

    /// Refill `level` after a caller consumed its last unassigned key.
    pub fn refill(&self, level: SecurityLevel) -> RunOutcome {
        let _guard = self.run_guard.lock();
        PoolRefill::new(&self.config, &self.collaborators).check_and_fill(level)
    }
}

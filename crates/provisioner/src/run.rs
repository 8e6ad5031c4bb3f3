//! One end-to-end provisioning attempt.

use crate::level::{LevelProvisioner, Pacing};
use crate::{Collaborators, FailureTracker, FetchFailure, ProvisionerConfig, Settings};
use keypool_accounting::{LevelPlan, PoolAccountant, PoolAction, ProvisioningNeed};
use keypool_core::{KeyStoreService, ProvisioningError, RunOutcome, RunReport};
use keypool_types::{DeviceConfigResponse, ImplInfo, ProvisioningConfig, RunId};
use std::time::Duration;
use tracing::{debug, error, info, info_span};

/// One execution of the provisioning state machine.
///
/// Sequential and blocking: it must run off any caller-facing thread. Pool
/// counts are never cached between steps; every decision is re-derived from a
/// fresh key store snapshot.
pub struct ProvisioningRun<'a> {
    config: &'a ProvisionerConfig,
    collaborators: &'a Collaborators,
    settings: Settings,
    failures: FailureTracker,
}

impl<'a> ProvisioningRun<'a> {
    pub fn new(config: &'a ProvisionerConfig, collaborators: &'a Collaborators) -> Self {
        let settings = Settings::new(collaborators.settings.clone());
        let failures = FailureTracker::new(settings.clone(), config.failure_maximum);
        Self {
            config,
            collaborators,
            settings,
            failures,
        }
    }

    /// Run to completion.
    ///
    /// Every failure is caught here and reported; the report never asks for a
    /// reschedule.
    pub fn execute(self) -> RunReport {
        let run_id = self.settings.next_run_id();
        let span = info_span!("provisioning_run", run_id = run_id.as_u64());
        let _guard = span.enter();

        info!("Starting provisioning run");
        let outcome = match self.drive(run_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Provisioning run aborted");
                RunOutcome::Aborted(e)
            }
        };
        info!(
            outcome = outcome.type_name(),
            certified = outcome.certified_keys(),
            "Provisioning run finished"
        );

        RunReport::new(run_id, outcome)
    }

    fn drive(&self, run_id: RunId) -> Result<RunOutcome, ProvisioningError> {
        // Start
        let key_store = self
            .collaborators
            .key_store
            .connect()
            .ok_or(ProvisioningError::ServiceUnavailable)?;

        // DetermineHorizon
        let metered = self.collaborators.network.is_metered();
        let stored_config = self.settings.device_config();
        let expiring_by = self.expiring_by(metered, &stored_config);
        debug!(metered, ?expiring_by, "Determined expiry horizon");

        // QueryPool
        let levels = key_store.list_supported_levels()?;
        if levels.is_empty() {
            return Err(ProvisioningError::NoImplementations);
        }

        // Decide
        let need = self.assess(key_store.as_ref(), &levels, expiring_by, &stored_config)?;
        if !need.needed {
            if metered {
                info!("No keys needed, skipping config refresh on metered network");
                return Ok(RunOutcome::NothingToDo {
                    config_refreshed: false,
                });
            }
            let response = match self.fetch_config() {
                Ok(response) => response,
                Err(failure) => return Ok(failure.into()),
            };
            return match PoolAccountant::decide(&response.config, &need) {
                PoolAction::Disable => self.disable(key_store.as_ref()),
                _ => Ok(RunOutcome::NothingToDo {
                    config_refreshed: true,
                }),
            };
        }

        // FetchConfig
        let response = match self.fetch_config() {
            Ok(response) => response,
            Err(failure) => return Ok(failure.into()),
        };

        // DisabledCheck, then re-derive the need from fresh snapshots and config
        if response.config.is_provisioning_disabled() {
            return self.disable(key_store.as_ref());
        }
        let expiring_by = self.expiring_by(metered, &response.config);
        let fresh = self.assess(key_store.as_ref(), &levels, expiring_by, &response.config)?;

        match PoolAccountant::decide(&response.config, &fresh) {
            PoolAction::Disable => self.disable(key_store.as_ref()),
            PoolAction::NoOp => {
                info!("Fresh config no longer needs keys");
                Ok(RunOutcome::NothingToDo {
                    config_refreshed: true,
                })
            }
            PoolAction::Populate(plans) => {
                debug!(%run_id, levels = plans.len(), "Populating pool");
                Ok(self.generate_and_certify(key_store.as_ref(), &plans, &response))
            }
        }
    }

    /// Expiry horizon as a duration since the Unix epoch.
    ///
    /// A metered network shortens the horizon so that only imminent expiry
    /// triggers provisioning over metered data.
    fn expiring_by(&self, metered: bool, config: &ProvisioningConfig) -> Duration {
        let window = if metered {
            self.config.metered_expiration_window
        } else {
            config.expiring_by
        };
        self.collaborators.clock.now().saturating_add(window)
    }

    fn assess(
        &self,
        key_store: &dyn KeyStoreService,
        levels: &[ImplInfo],
        expiring_by: Duration,
        config: &ProvisioningConfig,
    ) -> Result<ProvisioningNeed, ProvisioningError> {
        let statuses = levels
            .iter()
            .map(|info| key_store.get_pool_status(expiring_by, info.security_level))
            .collect::<Result<Vec<_>, _>>()?;

        PoolAccountant::is_provisioning_needed(levels, &statuses, config)
            .map_err(|e| ProvisioningError::InvalidArgument(e.to_string()))
    }

    fn fetch_config(&self) -> Result<DeviceConfigResponse, FetchFailure> {
        self.failures
            .fetch_device_config(self.collaborators.endorsement.as_ref())
    }

    fn disable(&self, key_store: &dyn KeyStoreService) -> Result<RunOutcome, ProvisioningError> {
        info!("Provisioning disabled by backend, deleting all keys");
        key_store.delete_all_keys()?;
        Ok(RunOutcome::Disabled)
    }

    fn generate_and_certify(
        &self,
        key_store: &dyn KeyStoreService,
        plans: &[LevelPlan],
        response: &DeviceConfigResponse,
    ) -> RunOutcome {
        let provisioner = LevelProvisioner {
            key_store,
            endorsement: self.collaborators.endorsement.as_ref(),
            clock: self.collaborators.clock.as_ref(),
            config: self.config,
        };

        let mut levels = Vec::with_capacity(plans.len());
        let mut failures = Vec::new();
        for plan in plans {
            let (summary, failure) = provisioner.provision(plan, response, Pacing::UnlessEmpty);
            levels.push(summary);
            failures.extend(failure);
        }

        if failures.is_empty() {
            RunOutcome::Provisioned { levels }
        } else {
            RunOutcome::PartialFailure { levels, failures }
        }
    }
}

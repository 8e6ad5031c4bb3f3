//! On-demand refill of a single level.

use crate::level::{LevelProvisioner, Pacing};
use crate::{Collaborators, FailureTracker, ProvisionerConfig, Settings};
use keypool_accounting::LevelPlan;
use keypool_core::{ProvisioningError, RunOutcome};
use keypool_types::{PoolStatus, SecurityLevel};
use tracing::{debug, error, info, warn};

/// Refills one level when a caller has taken its last unassigned key.
///
/// Unlike a periodic run this does not wait for expiry: it only reacts to an
/// exhausted pool. A level with no attested keys at all is left alone, since
/// that means provisioning is off for it and callers fall back to factory keys.
pub struct PoolRefill<'a> {
    config: &'a ProvisionerConfig,
    collaborators: &'a Collaborators,
    failures: FailureTracker,
}

impl<'a> PoolRefill<'a> {
    pub fn new(config: &'a ProvisionerConfig, collaborators: &'a Collaborators) -> Self {
        Self {
            config,
            collaborators,
            failures: FailureTracker::new(
                Settings::new(collaborators.settings.clone()),
                config.failure_maximum,
            ),
        }
    }

    /// Check `level` and refill it if exhausted.
    pub fn check_and_fill(&self, level: SecurityLevel) -> RunOutcome {
        match self.fill(level) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%level, error = %e, "Pool refill aborted");
                RunOutcome::Aborted(e)
            }
        }
    }

    fn fill(&self, level: SecurityLevel) -> Result<RunOutcome, ProvisioningError> {
        let key_store = self
            .collaborators
            .key_store
            .connect()
            .ok_or(ProvisioningError::ServiceUnavailable)?;

        let info = key_store
            .list_supported_levels()?
            .into_iter()
            .find(|info| info.security_level == level)
            .ok_or_else(|| {
                ProvisioningError::InvalidArgument(format!("{level} is not exposed by key store"))
            })?;

        let status = key_store.get_pool_status(self.collaborators.clock.now(), level)?;
        if !needs_refill(&status) {
            debug!(%level, %status, "Pool not exhausted, no refill");
            return Ok(RunOutcome::NothingToDo {
                config_refreshed: false,
            });
        }

        info!(%level, %status, "All signed keys are in use, refilling");
        let response = match self
            .failures
            .fetch_device_config(self.collaborators.endorsement.as_ref())
        {
            Ok(response) => response,
            Err(failure) => {
                warn!(%level, failures = failure.failures, "Refill failed");
                return Ok(failure.into());
            }
        };

        let extra = response.config.extra_signed_keys_available;
        if extra == 0 {
            info!(%level, "Provisioning disabled by backend, skipping refill");
            return Ok(RunOutcome::NothingToDo {
                config_refreshed: true,
            });
        }

        let plan = LevelPlan {
            info,
            status,
            keys_to_generate: extra.saturating_sub(status.unattested()),
            keys_to_certify: extra,
        };
        let provisioner = LevelProvisioner {
            key_store: key_store.as_ref(),
            endorsement: self.collaborators.endorsement.as_ref(),
            clock: self.collaborators.clock.as_ref(),
            config: self.config,
        };
        let (summary, failure) = provisioner.provision(&plan, &response, Pacing::Always);

        Ok(match failure {
            None => RunOutcome::Provisioned {
                levels: vec![summary],
            },
            Some(failure) => RunOutcome::PartialFailure {
                levels: vec![summary],
                failures: vec![failure],
            },
        })
    }
}

/// No unassigned keys left, but the level has been provisioned before.
fn needs_refill(status: &PoolStatus) -> bool {
    status.unassigned == 0 && status.attested != 0
}

//! Generate-and-certify for a single security level.

use crate::ProvisionerConfig;
use keypool_accounting::{BatchSchedule, LevelPlan};
use keypool_core::{
    Clock, EndorsementClient, EndorsementError, KeyStoreService, LevelSummary, ProvisioningError,
};
use keypool_types::{Challenge, CsrBatch, DeviceConfigResponse, EndorsementChain};
use tracing::{debug, info, warn};

/// Whether to pause between generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pacing {
    /// Pause unless the snapshot shows an empty pool (first boot).
    UnlessEmpty,
    /// Always pause between generations.
    Always,
}

/// Executes one level's batch schedule.
///
/// Levels and batches are processed strictly one at a time.
pub(crate) struct LevelProvisioner<'a> {
    pub key_store: &'a dyn KeyStoreService,
    pub endorsement: &'a dyn EndorsementClient,
    pub clock: &'a dyn Clock,
    pub config: &'a ProvisionerConfig,
}

impl LevelProvisioner<'_> {
    /// Generate and certify `plan` in ceiling-bounded batches.
    ///
    /// The first failing batch aborts the rest of this level. Batches certified
    /// before it are kept; the returned summary reflects them.
    pub fn provision(
        &self,
        plan: &LevelPlan,
        response: &DeviceConfigResponse,
        pacing: Pacing,
    ) -> (LevelSummary, Option<ProvisioningError>) {
        let level = plan.level();
        let mut summary = LevelSummary::new(level);

        let Some(chain) = response.chain_for(plan.info.supported_curve) else {
            let source = EndorsementError::MissingChain(plan.info.supported_curve);
            warn!(%level, error = %source, "Cannot build CSR for level");
            return (
                summary,
                Some(ProvisioningError::CertificationFailure { level, source }),
            );
        };

        let pause = match pacing {
            Pacing::Always => true,
            Pacing::UnlessEmpty => !plan.status.is_empty(),
        };
        let schedule = BatchSchedule::for_plan(plan, self.config.safe_csr_batch_size);
        let batches = schedule.len();

        info!(
            %level,
            generate = plan.keys_to_generate,
            certify = plan.keys_to_certify,
            batches,
            pause,
            "Provisioning level"
        );

        for (index, slice) in schedule.into_iter().enumerate() {
            for _ in 0..slice.generate {
                if pause && summary.generated > 0 {
                    self.clock.sleep(self.config.key_generation_pause);
                }
                if let Err(e) = self.key_store.generate_key_pair(self.config.test_mode, level) {
                    warn!(%level, batch = index, error = %e, "Key generation failed");
                    return (summary, Some(e.into()));
                }
                summary.generated += 1;
            }

            if let Err(source) = self.certify(plan, slice.certify, chain, &response.challenge) {
                warn!(
                    %level,
                    batch = index,
                    remaining = batches - index,
                    error = %source,
                    "CSR batch failed, abandoning remaining batches for level"
                );
                return (
                    summary,
                    Some(ProvisioningError::CertificationFailure { level, source }),
                );
            }

            summary.certified += slice.certify;
            summary.batches += 1;
            debug!(%level, batch = index, keys = slice.certify, "CSR batch certified");
        }

        (summary, None)
    }

    fn certify(
        &self,
        plan: &LevelPlan,
        count: u32,
        chain: &EndorsementChain,
        challenge: &Challenge,
    ) -> Result<(), EndorsementError> {
        let batch = CsrBatch::new(
            plan.level(),
            count,
            chain.clone(),
            challenge.clone(),
            self.config.safe_csr_batch_size,
        )
        .map_err(|e| EndorsementError::Rejected(e.to_string()))?;
        self.endorsement.certify_batch(&batch)
    }
}

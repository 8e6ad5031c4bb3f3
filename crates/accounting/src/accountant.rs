//! Per-level key demand.

use crate::AccountingError;
use keypool_types::{ImplInfo, PoolStatus, ProvisioningConfig, SecurityLevel};
use tracing::debug;

/// Demand computed for one security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPlan {
    pub info: ImplInfo,
    /// Snapshot the plan was derived from.
    pub status: PoolStatus,
    /// New key pairs to generate.
    pub keys_to_generate: u32,
    /// Keys to certify: the generated keys plus any already unattested ones.
    pub keys_to_certify: u32,
}

impl LevelPlan {
    pub fn level(&self) -> SecurityLevel {
        self.info.security_level
    }

    /// Whether this level has keys to generate or leftovers to certify.
    pub fn is_needed(&self) -> bool {
        self.keys_to_certify > 0
    }

    /// Unattested keys that already exist and will be certified before any new
    /// key is generated.
    pub fn existing_unattested(&self) -> u32 {
        self.keys_to_certify - self.keys_to_generate
    }
}

/// Result of evaluating every level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningNeed {
    /// True iff any level has keys to generate or certify.
    pub needed: bool,
    /// One plan per level, in the key store's enumeration order.
    pub plans: Vec<LevelPlan>,
}

impl ProvisioningNeed {
    /// New keys to generate per level, in enumeration order.
    pub fn keys_needed_per_level(&self) -> Vec<u32> {
        self.plans.iter().map(|p| p.keys_to_generate).collect()
    }

    /// Plans for the levels that need keys.
    pub fn levels_needing_keys(&self) -> impl Iterator<Item = &LevelPlan> {
        self.plans.iter().filter(|p| p.is_needed())
    }
}

/// Pure decision functions over pool snapshots.
///
/// Holds no state: the same snapshot and config always produce the same answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolAccountant;

impl PoolAccountant {
    /// Number of new keys to generate for one level.
    ///
    /// The steady-state target is every key currently handed out plus the
    /// configured buffer. When the pool is off target, or more keys expire than
    /// are spare, the whole target is regenerated in one cohort rather than
    /// topped up one key at a time, which keeps expiry dates aligned and
    /// batches network traffic.
    pub fn keys_needed(status: &PoolStatus, config: &ProvisioningConfig) -> u32 {
        Self::target_signed_keys(status, config)
            .map_or(0, |target| target.saturating_sub(status.unattested()))
    }

    /// Signed keys the level should hold, or `None` when it is already settled.
    fn target_signed_keys(status: &PoolStatus, config: &ProvisioningConfig) -> Option<u32> {
        let target = status.in_use().saturating_add(config.extra_signed_keys_available);

        // Exact equality on attested: a pool above target does not take this exit.
        if status.expiring <= status.unassigned && status.attested == target {
            return None;
        }
        Some(target)
    }

    /// Full plan for one level.
    ///
    /// Unless the level is settled, every unattested key is certified along
    /// with the new ones, even when the leftovers alone already cover the
    /// target. Otherwise a failed CSR would strand them uncertified.
    pub fn plan_level(
        info: ImplInfo,
        status: PoolStatus,
        config: &ProvisioningConfig,
    ) -> LevelPlan {
        let (keys_to_generate, keys_to_certify) = match Self::target_signed_keys(&status, config) {
            Some(target) if target > 0 => {
                let generate = target.saturating_sub(status.unattested());
                (generate, generate.saturating_add(status.unattested()))
            }
            _ => (0, 0),
        };

        debug!(
            level = %info.security_level,
            %status,
            extra = config.extra_signed_keys_available,
            keys_to_generate,
            keys_to_certify,
            "Planned level"
        );

        LevelPlan {
            info,
            status,
            keys_to_generate,
            keys_to_certify,
        }
    }

    /// Apply [`keys_needed`](Self::keys_needed) across every level.
    ///
    /// # Errors
    ///
    /// [`AccountingError::InvalidArgument`] if `levels` and `statuses` differ in
    /// length, [`AccountingError::InvalidPoolStatus`] if a snapshot breaks the
    /// pool invariants.
    pub fn is_provisioning_needed(
        levels: &[ImplInfo],
        statuses: &[PoolStatus],
        config: &ProvisioningConfig,
    ) -> Result<ProvisioningNeed, AccountingError> {
        if levels.len() != statuses.len() {
            return Err(AccountingError::InvalidArgument {
                levels: levels.len(),
                statuses: statuses.len(),
            });
        }

        let mut plans = Vec::with_capacity(levels.len());
        for (info, status) in levels.iter().zip(statuses) {
            status.validate()?;
            plans.push(Self::plan_level(*info, *status, config));
        }

        let needed = plans.iter().any(LevelPlan::is_needed);
        Ok(ProvisioningNeed { needed, plans })
    }
}

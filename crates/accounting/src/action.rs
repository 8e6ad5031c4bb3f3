//! The explicit action returned to the provisioner.

use crate::{LevelPlan, PoolAccountant, ProvisioningNeed};
use keypool_types::ProvisioningConfig;

/// What the provisioner should do with the pool.
///
/// Deleting keys is never performed inside the accounting logic; it is
/// returned as [`PoolAction::Disable`] and executed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolAction {
    /// Generate and certify keys for these levels, in order.
    Populate(Vec<LevelPlan>),
    /// Provisioning is administratively disabled: delete every key.
    Disable,
    /// Nothing to do.
    NoOp,
}

impl PoolAction {
    /// Get a human-readable name for this action.
    pub fn type_name(&self) -> &'static str {
        match self {
            PoolAction::Populate(_) => "Populate",
            PoolAction::Disable => "Disable",
            PoolAction::NoOp => "NoOp",
        }
    }
}

impl PoolAccountant {
    /// Combine a need with a freshly fetched config.
    ///
    /// A disabled config takes precedence over any need computed earlier.
    pub fn decide(fresh_config: &ProvisioningConfig, need: &ProvisioningNeed) -> PoolAction {
        if fresh_config.is_provisioning_disabled() {
            return PoolAction::Disable;
        }
        if !need.needed {
            return PoolAction::NoOp;
        }
        PoolAction::Populate(need.levels_needing_keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypool_test_helpers::{config_with_extra, status, strongbox, tee};
    use keypool_types::PoolStatus;

    fn need(statuses: &[PoolStatus]) -> ProvisioningNeed {
        PoolAccountant::is_provisioning_needed(&[tee(), strongbox()], statuses, &config_with_extra(6))
            .unwrap()
    }

    #[test]
    fn test_disable_takes_precedence() {
        let need = need(&[PoolStatus::EMPTY, PoolStatus::EMPTY]);
        assert!(need.needed);
        assert_eq!(
            PoolAccountant::decide(&config_with_extra(0), &need),
            PoolAction::Disable
        );
    }

    #[test]
    fn test_populate_only_levels_in_need() {
        let need = need(&[status(6, 6, 6, 0), PoolStatus::EMPTY]);
        match PoolAccountant::decide(&config_with_extra(6), &need) {
            PoolAction::Populate(plans) => {
                assert_eq!(plans.len(), 1);
                assert_eq!(plans[0].level(), strongbox().security_level);
                assert_eq!(plans[0].keys_to_generate, 6);
            }
            other => panic!("expected Populate, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_noop_when_nothing_needed() {
        let need = need(&[status(6, 6, 6, 0), status(6, 6, 6, 0)]);
        assert_eq!(
            PoolAccountant::decide(&config_with_extra(6), &need),
            PoolAction::NoOp
        );
    }
}

//! Attestation key pool snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Violations of the pool counter invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolStatusError {
    #[error("attested ({attested}) exceeds total ({total})")]
    AttestedExceedsTotal { attested: u32, total: u32 },

    #[error("unassigned ({unassigned}) exceeds attested ({attested})")]
    UnassignedExceedsAttested { unassigned: u32, attested: u32 },

    #[error("expiring ({expiring}) exceeds attested ({attested})")]
    ExpiringExceedsAttested { expiring: u32, attested: u32 },
}

/// Snapshot of one security level's key pool.
///
/// Owned and mutated exclusively by the key store; the provisioner only ever
/// reads snapshots. Invariants: `unassigned <= attested <= total` and
/// `expiring <= attested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStatus {
    /// All keys generated for this level, attested or not.
    pub total: u32,
    /// Keys certified by the backend.
    pub attested: u32,
    /// Attested keys not currently handed out to any caller.
    pub unassigned: u32,
    /// Attested keys whose certificate expires within the query horizon.
    pub expiring: u32,
}

impl PoolStatus {
    /// An empty pool (first boot).
    pub const EMPTY: Self = PoolStatus {
        total: 0,
        attested: 0,
        unassigned: 0,
        expiring: 0,
    };

    /// Create a validated snapshot.
    pub fn new(
        total: u32,
        attested: u32,
        unassigned: u32,
        expiring: u32,
    ) -> Result<Self, PoolStatusError> {
        let status = Self {
            total,
            attested,
            unassigned,
            expiring,
        };
        status.validate()?;
        Ok(status)
    }

    /// Check the counter invariants.
    pub fn validate(&self) -> Result<(), PoolStatusError> {
        if self.attested > self.total {
            return Err(PoolStatusError::AttestedExceedsTotal {
                attested: self.attested,
                total: self.total,
            });
        }
        if self.unassigned > self.attested {
            return Err(PoolStatusError::UnassignedExceedsAttested {
                unassigned: self.unassigned,
                attested: self.attested,
            });
        }
        if self.expiring > self.attested {
            return Err(PoolStatusError::ExpiringExceedsAttested {
                expiring: self.expiring,
                attested: self.attested,
            });
        }
        Ok(())
    }

    /// Keys generated but not yet certified.
    pub fn unattested(&self) -> u32 {
        self.total.saturating_sub(self.attested)
    }

    /// Attested keys currently handed out to callers.
    pub fn in_use(&self) -> u32 {
        self.attested.saturating_sub(self.unassigned)
    }

    /// Whether the pool holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} attested={} unassigned={} expiring={}",
            self.total, self.attested, self.unassigned, self.expiring
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_status() {
        let status = PoolStatus::new(25, 25, 10, 3).unwrap();
        assert_eq!(status.unattested(), 0);
        assert_eq!(status.in_use(), 15);
        assert!(!status.is_empty());
        assert!(PoolStatus::EMPTY.is_empty());
    }

    #[test]
    fn test_invariant_violations() {
        assert_eq!(
            PoolStatus::new(3, 4, 0, 0),
            Err(PoolStatusError::AttestedExceedsTotal {
                attested: 4,
                total: 3
            })
        );
        assert_eq!(
            PoolStatus::new(5, 4, 5, 0),
            Err(PoolStatusError::UnassignedExceedsAttested {
                unassigned: 5,
                attested: 4
            })
        );
        assert_eq!(
            PoolStatus::new(5, 4, 1, 6),
            Err(PoolStatusError::ExpiringExceedsAttested {
                expiring: 6,
                attested: 4
            })
        );
    }

    #[test]
    fn test_unattested_keys() {
        let status = PoolStatus::new(10, 4, 2, 0).unwrap();
        assert_eq!(status.unattested(), 6);
        assert_eq!(status.in_use(), 2);
    }
}

//! Endorsement material and certification batches.

use crate::{EcCurve, ProvisioningConfig, SecurityLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

/// Backend-issued endorsement certificate chain for one curve.
///
/// Opaque to the provisioner; it is handed to the CSR as-is.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndorsementChain(pub Vec<u8>);

impl EndorsementChain {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for EndorsementChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndorsementChain({} bytes)", self.0.len())
    }
}

/// Per-run challenge shared by every batch of that run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Challenge(pub Vec<u8>);

impl Challenge {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge({})", hex::encode(&self.0))
    }
}

/// Response to a device configuration fetch.
///
/// Carries the configuration to persist together with the material needed to
/// build CSRs for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfigResponse {
    pub config: ProvisioningConfig,
    pub endorsement_chains: BTreeMap<EcCurve, EndorsementChain>,
    pub challenge: Challenge,
}

impl DeviceConfigResponse {
    /// Endorsement chain for the given curve, if the backend issued one.
    pub fn chain_for(&self, curve: EcCurve) -> Option<&EndorsementChain> {
        self.endorsement_chains.get(&curve)
    }
}

/// Reasons a batch cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsrBatchError {
    #[error("CSR batch must certify at least one key")]
    Empty,

    #[error("CSR batch of {count} keys exceeds the safety ceiling of {ceiling}")]
    ExceedsCeiling { count: u32, ceiling: u32 },
}

/// Bounded request to certify `count` unattested keys of one security level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrBatch {
    level: SecurityLevel,
    count: u32,
    endorsement_chain: EndorsementChain,
    challenge: Challenge,
}

impl CsrBatch {
    /// Build a batch, enforcing `1 <= count <= ceiling`.
    pub fn new(
        level: SecurityLevel,
        count: u32,
        endorsement_chain: EndorsementChain,
        challenge: Challenge,
        ceiling: NonZeroU32,
    ) -> Result<Self, CsrBatchError> {
        if count == 0 {
            return Err(CsrBatchError::Empty);
        }
        if count > ceiling.get() {
            return Err(CsrBatchError::ExceedsCeiling {
                count,
                ceiling: ceiling.get(),
            });
        }
        Ok(Self {
            level,
            count,
            endorsement_chain,
            challenge,
        })
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn endorsement_chain(&self) -> &EndorsementChain {
        &self.endorsement_chain
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ceiling(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_batch_bounds() {
        let chain = EndorsementChain(vec![1, 2, 3]);
        let challenge = Challenge(vec![0xab]);

        let batch = CsrBatch::new(
            SecurityLevel::TrustedEnvironment,
            20,
            chain.clone(),
            challenge.clone(),
            ceiling(20),
        )
        .unwrap();
        assert_eq!(batch.count(), 20);
        assert_eq!(batch.level(), SecurityLevel::TrustedEnvironment);

        assert_eq!(
            CsrBatch::new(
                SecurityLevel::StrongBox,
                0,
                chain.clone(),
                challenge.clone(),
                ceiling(20)
            ),
            Err(CsrBatchError::Empty)
        );
        assert_eq!(
            CsrBatch::new(SecurityLevel::StrongBox, 21, chain, challenge, ceiling(20)),
            Err(CsrBatchError::ExceedsCeiling {
                count: 21,
                ceiling: 20
            })
        );
    }

    #[test]
    fn test_chain_lookup_by_curve() {
        let response = DeviceConfigResponse {
            config: ProvisioningConfig::default(),
            endorsement_chains: [(EcCurve::P256, EndorsementChain(vec![7]))]
                .into_iter()
                .collect(),
            challenge: Challenge(vec![1, 2]),
        };
        assert!(response.chain_for(EcCurve::P256).is_some());
        assert!(response.chain_for(EcCurve::Curve25519).is_none());
        assert_eq!(format!("{:?}", response.challenge), "Challenge(0102)");
    }
}

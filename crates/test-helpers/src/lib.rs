//! Test fixtures shared across the keypool crates.
//!
//! Fixtures panic on invalid input; they are only meant for tests.

use keypool_types::{
    Challenge, DeviceConfigResponse, EcCurve, EndorsementChain, ImplInfo, PoolStatus,
    ProvisioningConfig, SecurityLevel,
};
use std::time::Duration;

/// Build a validated pool snapshot.
///
/// # Panics
///
/// Panics if the counters break the pool invariants.
pub fn status(total: u32, attested: u32, unassigned: u32, expiring: u32) -> PoolStatus {
    PoolStatus::new(total, attested, unassigned, expiring)
        .unwrap_or_else(|e| panic!("invalid test pool status: {e}"))
}

/// Default config with a custom buffer size.
pub fn config_with_extra(extra: u32) -> ProvisioningConfig {
    ProvisioningConfig::with_extra_keys(extra)
}

/// TEE level, as most devices expose it.
pub fn tee() -> ImplInfo {
    ImplInfo::new(SecurityLevel::TrustedEnvironment, EcCurve::Curve25519)
}

/// StrongBox level.
pub fn strongbox() -> ImplInfo {
    ImplInfo::new(SecurityLevel::StrongBox, EcCurve::P256)
}

/// Endorsement chain fixture for a curve.
pub fn chain(curve: EcCurve) -> EndorsementChain {
    match curve {
        EcCurve::P256 => EndorsementChain(vec![0x30, 0x82, 0x01, 0x00]),
        EcCurve::Curve25519 => EndorsementChain(vec![0x84, 0x43, 0xa1, 0x01]),
    }
}

/// A device config response carrying chains for every curve.
pub fn device_config(extra: u32) -> DeviceConfigResponse {
    DeviceConfigResponse {
        config: ProvisioningConfig::with_extra_keys(extra)
            .with_expiring_by(Duration::from_secs(3 * 24 * 60 * 60)),
        endorsement_chains: [EcCurve::P256, EcCurve::Curve25519]
            .into_iter()
            .map(|curve| (curve, chain(curve)))
            .collect(),
        challenge: Challenge(b"test-challenge".to_vec()),
    }
}

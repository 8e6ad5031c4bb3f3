//! Error types for provisioning.

use keypool_types::{EcCurve, SecurityLevel};
use thiserror::Error;

/// Errors reported by the key store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    /// The key store stopped responding.
    #[error("Key store unreachable")]
    Unreachable,

    /// The key store rejected or failed an operation.
    #[error("Key store service error: {0}")]
    Service(String),
}

/// Errors reported by the endorsement backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndorsementError {
    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered but refused the request.
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    /// The device config carried no endorsement chain for a level's curve.
    #[error("No endorsement chain for curve {0}")]
    MissingChain(EcCurve),
}

/// Errors reported by a [`SettingsStore`](crate::SettingsStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Settings I/O error: {0}")]
    Io(String),

    #[error("Settings encoding error: {0}")]
    Encoding(String),
}

/// Run-level failure taxonomy.
///
/// Every variant is caught at the run boundary and turned into a report that
/// does not request a reschedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// The key store handle could not be resolved.
    #[error("Key store service unavailable")]
    ServiceUnavailable,

    /// The key store exposes no security levels.
    #[error("Key store reports no implementations")]
    NoImplementations,

    /// Fetching the device configuration failed.
    #[error("Device config fetch failed: {0}")]
    ConfigFetchFailure(#[source] EndorsementError),

    /// A CSR batch was rejected or failed in transit.
    #[error("Certification failed for {level}: {source}")]
    CertificationFailure {
        level: SecurityLevel,
        #[source]
        source: EndorsementError,
    },

    /// Programmer-level mismatch between parallel inputs.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The key store failed after the handle was resolved.
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
}

//! Core types for attestation key pool provisioning.
//!
//! This crate provides the plain data model shared by every other crate:
//!
//! - [`SecurityLevel`] / [`ImplInfo`]: the isolated key-management environments
//!   exposed by the key store, each owning an independent pool
//! - [`PoolStatus`]: a snapshot of one level's pool counters
//! - [`ProvisioningConfig`]: the backend-supplied, locally persisted buffer size,
//!   expiry horizon and backend URL
//! - [`DeviceConfigResponse`] / [`CsrBatch`]: endorsement material and the
//!   bounded certification request built from it
//!
//! No I/O happens here. Ports to the outside world live in `keypool-core`.

mod config;
mod endorsement;
mod identifiers;
mod pool;
pub mod serde_millis;

pub use config::{
    ProvisioningConfig, DEFAULT_EXPIRING_BY, DEFAULT_EXTRA_SIGNED_KEYS, DEFAULT_REMOTE_URL,
};
pub use endorsement::{Challenge, CsrBatch, CsrBatchError, DeviceConfigResponse, EndorsementChain};
pub use identifiers::{EcCurve, ImplInfo, RunId, SecurityLevel};
pub use pool::{PoolStatus, PoolStatusError};

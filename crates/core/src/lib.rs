//! Core ports for attestation key pool provisioning.
//!
//! The provisioner sits between a capability-based key store and a remote
//! endorsement backend. Everything it talks to is expressed here as a trait so
//! the decision and orchestration logic stays testable in isolation:
//!
//! - [`PoolStatusSource`] / [`KeyStoreClient`]: the secure-element backed key store
//! - [`KeyStoreConnector`]: resolves the key store handle at the start of a run
//! - [`EndorsementClient`]: device config fetch and CSR certification
//! - [`NetworkConditionProbe`]: metered network detection
//! - [`SettingsStore`]: small key-value persistence port
//! - [`Clock`]: wall-clock time and the generation pause
//!
//! Run results are reported as a [`RunReport`]; failures use the
//! [`ProvisioningError`] taxonomy.

mod error;
mod memory;
mod outcome;
mod traits;

pub use error::{EndorsementError, KeyStoreError, ProvisioningError, StoreError};
pub use memory::MemorySettingsStore;
pub use outcome::{LevelSummary, RunOutcome, RunReport};
pub use traits::{
    Clock, EndorsementClient, KeyStoreClient, KeyStoreConnector, KeyStoreService,
    NetworkConditionProbe, PoolStatusSource, SettingsStore, SystemClock,
};

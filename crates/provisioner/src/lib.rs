//! Attestation key pool provisioning.
//!
//! This crate drives one provisioning attempt end to end. It owns no business
//! rules of its own: every "how many keys" question is answered by
//! `keypool-accounting`, and every side effect goes through the ports in
//! `keypool-core`.
//!
//! # Run state machine
//!
//! ```text
//! Start ──► DetermineHorizon ──► QueryPool ──► Decide
//!   │                               │            │ not needed
//!   │ no key store                  │ no levels  ├──► metered: Done
//!   ▼                               ▼            └──► unmetered: refresh config
//! Aborted                        Aborted                (Disable if extra == 0)
//!                                                │ needed
//!                                                ▼
//!                                  FetchConfig ──► (fail: FailureTracker) ──► Done
//!                                                │
//!                                                ▼
//!                                  DisabledCheck ──► delete all keys ──► Done
//!                                                │
//!                                                ▼
//!                       GenerateAndCertify (level by level, batch by batch) ──► Done
//! ```
//!
//! No run ever asks to be rescheduled; the external trigger owns retries.
//!
//! # Components
//!
//! - [`Provisioner`] - Entry point, serializes runs behind a guard
//! - [`ProvisioningRun`] - One execution of the state machine
//! - [`PoolRefill`] - On-demand refill when a level runs out of unassigned keys
//! - [`FailureTracker`] - Consecutive config-fetch failure circuit breaker
//! - [`Settings`] - Typed view over the persisted key-value store
//! - [`ProvisionerConfig`] - Batch ceiling, pauses and thresholds

mod config;
mod failure;
mod level;
mod provisioner;
mod refill;
mod run;
mod settings;

pub use config::{ProvisionerConfig, DEFAULT_SAFE_CSR_BATCH_SIZE};
pub use failure::{FailureTracker, FetchFailure};
pub use provisioner::{Collaborators, Provisioner};
pub use refill::PoolRefill;
pub use run::ProvisioningRun;
pub use settings::Settings;

//! Pool accounting for attestation key provisioning.
//!
//! This crate answers one question per security level: how many new keys must
//! be generated and certified so the pool covers every key currently handed
//! out plus a configured buffer, before existing certificates expire.
//!
//! Everything here is a pure function of a [`PoolStatus`] snapshot and a
//! [`ProvisioningConfig`]. No key store or network calls happen in this crate;
//! the provisioner feeds in snapshots and executes the returned [`PoolAction`].
//!
//! # Decision flow
//!
//! ```text
//!  PoolStatus[]  ──┐
//!                  ├──► PoolAccountant::is_provisioning_needed ──► ProvisioningNeed
//!  ProvisioningConfig ┘                                                │
//!                                                                       ▼
//!  fresh ProvisioningConfig ─────────► PoolAccountant::decide ──► PoolAction
//!                                                                {Populate | Disable | NoOp}
//!                                                                       │
//!                                                                       ▼
//!                                                   BatchSchedule (per level, ceiling-bounded)
//! ```
//!
//! [`PoolStatus`]: keypool_types::PoolStatus
//! [`ProvisioningConfig`]: keypool_types::ProvisioningConfig

mod accountant;
mod action;
mod batch;
mod error;

pub use accountant::{LevelPlan, PoolAccountant, ProvisioningNeed};
pub use action::PoolAction;
pub use batch::{split_batches, BatchSchedule, BatchSlice};
pub use error::AccountingError;

//! Deterministic simulation of the provisioning environment.
//!
//! Every collaborator the provisioner talks to has an in-process stand-in
//! here. Randomness comes from a seeded ChaCha RNG and time from a virtual
//! clock, so the same seed always produces the same run.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SimulationRunner                      │
//! │                                                          │
//! │   for each trigger:                                      │
//! │     advance SimClock ──► prune ──► run ──► apps consume  │
//! │                                │                         │
//! │                                ▼                         │
//! │   ┌──────────────────────────────────────────────────┐   │
//! │   │ Provisioner                                      │   │
//! │   │   SimConnector ──► SimKeyStore ◄── certify ──┐   │   │
//! │   │   SimEndorsementBackend ─────────────────────┘   │   │
//! │   │   SimNetwork, SimClock, MemorySettingsStore      │   │
//! │   └──────────────────────────────────────────────────┘   │
//! │                                │                         │
//! │                                ▼                         │
//! │                        SimulationStats                   │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod clock;
mod endorsement;
mod environment;
mod key_store;
mod network;
mod runner;

pub use clock::SimClock;
pub use endorsement::{EndorsementCounters, SimEndorsementBackend};
pub use environment::SimEnvironment;
pub use key_store::{KeyStoreCounters, SimConnector, SimKeyStore};
pub use network::SimNetwork;
pub use runner::{SimulationConfig, SimulationRunner, SimulationStats};

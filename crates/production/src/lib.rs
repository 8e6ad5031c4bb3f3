//! Production runner for attestation key provisioning.
//!
//! Wraps a [`Provisioner`](keypool_provisioner::Provisioner) in a single
//! tokio worker fed by a periodic timer, with settings persisted to a JSON
//! file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ run_daemon                                           │
//! │                                                      │
//! │  interval tick ──► on_trigger() ──┐                  │
//! │  request_refill(level) ───────────┤                  │
//! │                                   ▼                  │
//! │                    mpsc queue (bounded, one worker)  │
//! │                                   │                  │
//! │                                   ▼                  │
//! │                 spawn_blocking(Provisioner::run)     │
//! │                                   │                  │
//! │                                   ▼                  │
//! │                    FileSettingsStore (JSON, rename)  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ProvisioningWorker`] - Serial job queue with trigger deduplication
//! - [`FileSettingsStore`] - Durable [`SettingsStore`](keypool_core::SettingsStore)
//! - [`DaemonConfig`] - TOML configuration
//! - [`init_tracing`] - `tracing-subscriber` setup with `EnvFilter`

mod config;
mod daemon;
mod settings_store;
mod telemetry;
mod worker;

pub use config::{ConfigError, DaemonConfig};
pub use daemon::{run_daemon, DaemonError, DaemonPorts};
pub use settings_store::FileSettingsStore;
pub use telemetry::{init_tracing, TelemetryError};
pub use worker::{Job, ProvisioningWorker, WorkerError, WorkerSummary};

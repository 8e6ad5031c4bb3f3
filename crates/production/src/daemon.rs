//! Daemon wiring: settings file, worker and periodic trigger.

use crate::{ConfigError, DaemonConfig, FileSettingsStore, ProvisioningWorker, WorkerError, WorkerSummary};
use keypool_core::{
    Clock, EndorsementClient, KeyStoreConnector, NetworkConditionProbe, StoreError, SystemClock,
};
use keypool_provisioner::{Collaborators, Provisioner};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open settings: {0}")]
    Settings(#[from] StoreError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Platform collaborators the daemon cannot build itself.
#[derive(Clone)]
pub struct DaemonPorts {
    pub key_store: Arc<dyn KeyStoreConnector>,
    pub endorsement: Arc<dyn EndorsementClient>,
    pub network: Arc<dyn NetworkConditionProbe>,
    /// Defaults to [`SystemClock`] when `None`.
    pub clock: Option<Arc<dyn Clock>>,
}

/// Run the provisioning daemon until `shutdown` resolves.
///
/// Fires a periodic trigger immediately and then every
/// `config.trigger_interval`. On shutdown the queued jobs finish before this
/// returns.
pub async fn run_daemon(
    config: DaemonConfig,
    ports: DaemonPorts,
    shutdown: impl Future<Output = ()>,
) -> Result<WorkerSummary, DaemonError> {
    config.validate()?;
    let settings = Arc::new(FileSettingsStore::open(&config.settings_path)?);
    info!(
        settings = %settings.path().display(),
        interval = ?config.trigger_interval,
        "Starting provisioning daemon"
    );

    let collaborators = Collaborators {
        key_store: ports.key_store,
        endorsement: ports.endorsement,
        network: ports.network,
        settings,
        clock: ports
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
    };
    let provisioner = Arc::new(Provisioner::new(config.provisioner.clone(), collaborators));
    let worker = ProvisioningWorker::spawn(provisioner, config.queue_depth);

    let mut ticker = tokio::time::interval(config.trigger_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let queued = worker.on_trigger();
                debug!(queued, "Periodic trigger fired");
            }
        }
    }

    info!("Shutting down provisioning daemon");
    Ok(worker.shutdown().await?)
}

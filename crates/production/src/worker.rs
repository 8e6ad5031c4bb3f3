//! Single-worker job queue around a [`Provisioner`].

use keypool_core::{RunOutcome, RunReport};
use keypool_provisioner::Provisioner;
use keypool_types::SecurityLevel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Work the worker can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// A full periodic provisioning run.
    Periodic,
    /// Refill one level after a caller took its last unassigned key.
    Refill(SecurityLevel),
}

/// What the worker did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub periodic_runs: u64,
    pub refills: u64,
    /// Jobs that panicked instead of producing a result.
    pub failed_jobs: u64,
    pub last_report: Option<RunReport>,
}

/// Owns the single task that executes provisioning jobs.
///
/// Jobs run one at a time, in order, on tokio's blocking pool. At most one
/// periodic run is queued or in flight: a trigger arriving while one is pending
/// is declined rather than stacked.
pub struct ProvisioningWorker {
    jobs: mpsc::Sender<Job>,
    periodic_pending: Arc<AtomicBool>,
    handle: JoinHandle<WorkerSummary>,
}

impl ProvisioningWorker {
    /// Spawn the worker task on the current runtime.
    pub fn spawn(provisioner: Arc<Provisioner>, queue_depth: usize) -> Self {
        let (jobs, receiver) = mpsc::channel(queue_depth.max(1));
        let periodic_pending = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_jobs(provisioner, receiver, periodic_pending.clone()));

        Self {
            jobs,
            periodic_pending,
            handle,
        }
    }

    /// Periodic trigger callback.
    ///
    /// Returns true if a run was queued, false if one is already pending or
    /// the queue is full.
    pub fn on_trigger(&self) -> bool {
        if self.periodic_pending.swap(true, Ordering::SeqCst) {
            debug!("Periodic run already pending, declining trigger");
            return false;
        }
        match self.jobs.try_send(Job::Periodic) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to queue periodic run");
                self.periodic_pending.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Cancellation callback from the trigger.
    ///
    /// The worker never asks to be rescheduled, even when cancelled mid-run.
    pub fn on_cancel_requested(&self) -> bool {
        false
    }

    /// Queue a refill of `level`. Returns false if the queue is full or closed.
    pub fn request_refill(&self, level: SecurityLevel) -> bool {
        match self.jobs.try_send(Job::Refill(level)) {
            Ok(()) => true,
            Err(e) => {
                warn!(%level, error = %e, "Failed to queue refill");
                false
            }
        }
    }

    /// Whether a periodic run is queued or executing.
    pub fn is_periodic_pending(&self) -> bool {
        self.periodic_pending.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs, finish the queued ones and join the task.
    pub async fn shutdown(self) -> Result<WorkerSummary, WorkerError> {
        drop(self.jobs);
        let summary = self.handle.await?;
        info!(
            periodic_runs = summary.periodic_runs,
            refills = summary.refills,
            "Provisioning worker stopped"
        );
        Ok(summary)
    }
}

enum JobResult {
    Periodic(RunReport),
    Refill(SecurityLevel, RunOutcome),
}

async fn run_jobs(
    provisioner: Arc<Provisioner>,
    mut receiver: mpsc::Receiver<Job>,
    periodic_pending: Arc<AtomicBool>,
) -> WorkerSummary {
    let mut summary = WorkerSummary::default();

    while let Some(job) = receiver.recv().await {
        let provisioner = provisioner.clone();
        let result = tokio::task::spawn_blocking(move || match job {
            Job::Periodic => JobResult::Periodic(provisioner.run()),
            Job::Refill(level) => JobResult::Refill(level, provisioner.refill(level)),
        })
        .await;

        if job == Job::Periodic {
            periodic_pending.store(false, Ordering::SeqCst);
        }

        match result {
            Ok(JobResult::Periodic(report)) => {
                info!(%report, certified = report.outcome.certified_keys(), "Periodic run complete");
                summary.periodic_runs += 1;
                summary.last_report = Some(report);
            }
            Ok(JobResult::Refill(level, outcome)) => {
                info!(%level, outcome = outcome.type_name(), "Refill complete");
                summary.refills += 1;
            }
            Err(e) => {
                error!(?job, error = %e, "Provisioning job panicked");
                summary.failed_jobs += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use keypool_provisioner::ProvisionerConfig;
    use keypool_simulation::SimEnvironment;
    use keypool_test_helpers::tee;
    use keypool_types::RunId;

    fn worker(env: &SimEnvironment) -> ProvisioningWorker {
        let provisioner = Arc::new(env.provisioner(ProvisionerConfig::default()));
        ProvisioningWorker::spawn(provisioner, 4)
    }

    #[tokio::test]
    async fn test_trigger_runs_once() {
        let env = SimEnvironment::new(vec![tee()], 1);
        let worker = worker(&env);

        assert!(worker.on_trigger());
        let summary = worker.shutdown().await.unwrap();

        assert_eq!(summary.periodic_runs, 1);
        assert_eq!(summary.last_report.map(|r| r.run_id), Some(RunId(1)));
        assert_eq!(env.key_store.counters().generated, 6);
    }

    #[tokio::test]
    async fn test_pending_trigger_is_declined() {
        let env = SimEnvironment::new(vec![tee()], 1);
        let worker = worker(&env);

        // Current-thread runtime: the worker cannot pick up the job until we yield.
        assert!(worker.on_trigger());
        assert!(worker.is_periodic_pending());
        assert!(!worker.on_trigger());
        assert!(!worker.on_cancel_requested());

        let summary = worker.shutdown().await.unwrap();
        assert_eq!(summary.periodic_runs, 1);
    }

    #[tokio::test]
    async fn test_trigger_accepted_after_run_completes() {
        let env = SimEnvironment::new(vec![tee()], 1);
        let worker = worker(&env);

        assert!(worker.on_trigger());
        while worker.is_periodic_pending() {
            tokio::task::yield_now().await;
        }
        assert!(worker.on_trigger());

        let summary = worker.shutdown().await.unwrap();
        assert_eq!(summary.periodic_runs, 2);
    }

    #[tokio::test]
    async fn test_refill_jobs_run_in_order() {
        let env = SimEnvironment::new(vec![tee()], 1);
        let worker = worker(&env);

        assert!(worker.on_trigger());
        assert!(worker.request_refill(SecurityLevel::TrustedEnvironment));
        let summary = worker.shutdown().await.unwrap();

        assert_eq!(summary.periodic_runs, 1);
        assert_eq!(summary.refills, 1);
        // The pool was freshly stocked, so the refill found nothing to do.
        assert_eq!(env.endorsement.counters().fetch_calls, 1);
    }
}

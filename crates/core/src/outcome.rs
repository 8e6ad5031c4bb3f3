//! Run results.

use crate::ProvisioningError;
use keypool_types::{RunId, SecurityLevel};
use std::fmt;

/// What one level's generate-and-certify pass achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSummary {
    pub level: SecurityLevel,
    /// Key pairs generated.
    pub generated: u32,
    /// Keys certified by the backend.
    pub certified: u32,
    /// CSR batches accepted by the backend.
    pub batches: u32,
}

impl LevelSummary {
    pub fn new(level: SecurityLevel) -> Self {
        Self {
            level,
            generated: 0,
            certified: 0,
            batches: 0,
        }
    }
}

/// Terminal state of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every level that needed keys was fully certified.
    Provisioned { levels: Vec<LevelSummary> },

    /// No level needed keys.
    ///
    /// `config_refreshed` is true when the idle run still re-fetched the
    /// device config (unmetered network).
    NothingToDo { config_refreshed: bool },

    /// The backend reports zero extra keys; all keys were deleted.
    Disabled,

    /// The device config fetch failed.
    ///
    /// `failures` is the consecutive failure count after this failure and
    /// `reset` is true when the count crossed the threshold and persisted
    /// configuration was cleared.
    ConfigFetchFailed { failures: u32, reset: bool },

    /// At least one level had a batch fail. Batches certified before the
    /// failure are kept.
    PartialFailure {
        levels: Vec<LevelSummary>,
        failures: Vec<ProvisioningError>,
    },

    /// The run stopped before touching the backend.
    Aborted(ProvisioningError),
}

impl RunOutcome {
    /// Get a human-readable name for this outcome.
    pub fn type_name(&self) -> &'static str {
        match self {
            RunOutcome::Provisioned { .. } => "Provisioned",
            RunOutcome::NothingToDo { .. } => "NothingToDo",
            RunOutcome::Disabled => "Disabled",
            RunOutcome::ConfigFetchFailed { .. } => "ConfigFetchFailed",
            RunOutcome::PartialFailure { .. } => "PartialFailure",
            RunOutcome::Aborted(_) => "Aborted",
        }
    }

    /// Check if the run ended without any failure.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RunOutcome::Provisioned { .. } | RunOutcome::NothingToDo { .. } | RunOutcome::Disabled
        )
    }

    /// Total keys certified across all levels.
    pub fn certified_keys(&self) -> u32 {
        match self {
            RunOutcome::Provisioned { levels } | RunOutcome::PartialFailure { levels, .. } => {
                levels.iter().map(|l| l.certified).sum()
            }
            _ => 0,
        }
    }
}

/// Result of one run, handed back to the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn new(run_id: RunId, outcome: RunOutcome) -> Self {
        Self { run_id, outcome }
    }

    /// Whether the run asks the trigger to reschedule it.
    ///
    /// Always false: the next periodic trigger is solely responsible for
    /// retrying, so the provisioner never schedules itself.
    pub fn wants_reschedule(&self) -> bool {
        false
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.run_id, self.outcome.type_name())
    }
}

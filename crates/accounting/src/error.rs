//! Error types for pool accounting.

use keypool_types::PoolStatusError;
use thiserror::Error;

/// Errors from the accounting functions.
///
/// None of these are expected at runtime; they indicate a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
    /// Parallel inputs disagree in length.
    #[error("Invalid argument: {levels} levels but {statuses} pool statuses")]
    InvalidArgument { levels: usize, statuses: usize },

    /// A snapshot violates the pool counter invariants.
    #[error("Invalid pool status: {0}")]
    InvalidPoolStatus(#[from] PoolStatusError),
}

//! Numbering domain errors
//!
//! This module defines all error types that can occur while managing
//! numbering series and issuing policy numbers.

use thiserror::Error;

use core_kernel::{CoreError, DealerId, PortError, SeriesId};

/// Errors that can occur in the numbering domain
#[derive(Debug, Error)]
pub enum NumberingError {
    /// The series does not exist or has been deleted
    #[error("Series not found: {0}")]
    SeriesNotFound(SeriesId),

    /// No unissued numbers remain in the series
    #[error("Series {series} is depleted (end number {end_number})")]
    SeriesDepleted {
        series: String,
        end_number: i64,
    },

    /// The dealer is unknown to the dealer directory
    #[error("Dealer not found: {0}")]
    DealerNotFound(DealerId),

    /// The dealer exists but may not own series
    #[error("Dealer {0} is not active")]
    DealerInactive(DealerId),

    /// The read-increment-write did not complete within the retry budget
    #[error("Allocation conflict on series {series_id} after {attempts} attempts")]
    AllocationConflict {
        series_id: SeriesId,
        attempts: u32,
    },

    /// Range bounds are invalid or overlap another series
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Another series already uses this code
    #[error("Series code already exists: {0}")]
    DuplicateSeries(String),

    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stored series violates the range invariants
    #[error("Corrupt series record {series_id}: {reason}")]
    CorruptSeries {
        series_id: SeriesId,
        reason: String,
    },

    /// Non-transient storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl NumberingError {
    /// Creates an invalid range error
    pub fn invalid_range(message: impl Into<String>) -> Self {
        NumberingError::InvalidRange(message.into())
    }

    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        NumberingError::Validation(message.into())
    }

    /// Returns true if the caller may safely retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, NumberingError::AllocationConflict { .. })
    }

    /// Stable machine-readable kind, used in API error bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            NumberingError::SeriesNotFound(_) => "series_not_found",
            NumberingError::SeriesDepleted { .. } => "series_depleted",
            NumberingError::DealerNotFound(_) => "dealer_not_found",
            NumberingError::DealerInactive(_) => "dealer_inactive",
            NumberingError::AllocationConflict { .. } => "allocation_conflict",
            NumberingError::InvalidRange(_) => "invalid_range",
            NumberingError::DuplicateSeries(_) => "duplicate_series",
            NumberingError::Validation(_) => "validation_error",
            NumberingError::CorruptSeries { .. } => "internal_error",
            NumberingError::Storage(_) => "internal_error",
        }
    }
}

impl From<CoreError> for NumberingError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(msg) => NumberingError::Validation(msg),
            other => NumberingError::Validation(other.to_string()),
        }
    }
}

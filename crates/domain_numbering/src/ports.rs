//! Numbering Domain Ports
//!
//! This module defines the port interfaces the allocator needs from the
//! outside world:
//!
//! - [`SeriesStore`]: durable storage of series, their versions and events
//! - [`DealerDirectory`]: the external dealer collaborator
//!
//! # Concurrency contract
//!
//! Stores never lock on behalf of the caller. Instead every write is a
//! *conditional commit*: the new snapshot is persisted only if the stored
//! version still equals `expected_version`, and the accompanying event is
//! appended in the same atomic step. A lost race is reported as
//! [`CommitOutcome::VersionConflict`], never as an error.
//!
//! ```rust,ignore
//! let mut series = store.get(id).await?.ok_or(...)?;
//! let expected = series.version();
//! let issued = series.issue_next(Utc::now())?;
//! match store.commit(&SeriesCommit::new(series, expected, event)).await? {
//!     CommitOutcome::Committed => Ok(issued),
//!     CommitOutcome::VersionConflict => retry(),
//!     ...
//! }
//! ```

use async_trait::async_trait;

use core_kernel::{DealerId, DomainPort, HealthCheckable, PortError, SeriesId};

use crate::dealer::Dealer;
use crate::events::{Issuance, RecordedEvent, SeriesEvent};
use crate::series::PolicySeries;

/// Query parameters for listing series
#[derive(Debug, Clone, Default)]
pub struct SeriesQuery {
    /// Filter by owning dealer
    pub dealer_id: Option<DealerId>,
    /// Include soft-deleted series
    pub include_deleted: bool,
    /// Limit results
    pub limit: Option<u32>,
    /// Offset for pagination
    pub offset: Option<u32>,
}

impl SeriesQuery {
    /// Creates a query for the series owned by a dealer
    pub fn by_dealer(dealer_id: DealerId) -> Self {
        Self {
            dealer_id: Some(dealer_id),
            ..Default::default()
        }
    }

    /// Adds pagination to the query
    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Returns true if a series passes the filters (pagination excluded)
    pub fn matches(&self, series: &PolicySeries) -> bool {
        if !self.include_deleted && series.is_deleted() {
            return false;
        }
        if let Some(dealer_id) = self.dealer_id {
            if series.dealer_id() != dealer_id {
                return false;
            }
        }
        true
    }
}

/// A conditional write of a series snapshot and its event
#[derive(Debug, Clone)]
pub struct SeriesCommit {
    pub series: PolicySeries,
    pub expected_version: i64,
    pub event: SeriesEvent,
}

impl SeriesCommit {
    pub fn new(series: PolicySeries, expected_version: i64, event: SeriesEvent) -> Self {
        Self {
            series,
            expected_version,
            event,
        }
    }
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Snapshot and event were persisted
    Committed,
    /// The stored version moved on (or the series vanished); nothing was written
    VersionConflict,
    /// Another series already uses the code; nothing was written
    DuplicateCode,
    /// The range overlaps another series; nothing was written
    RangeOverlap,
}

/// Durable storage for policy series
///
/// Implementations: `InMemorySeriesStore` (this crate) and
/// `PostgresSeriesStore` (infra_db).
#[async_trait]
pub trait SeriesStore: DomainPort + HealthCheckable {
    /// Inserts a new series together with its creation event
    async fn insert(
        &self,
        series: &PolicySeries,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError>;

    /// Retrieves a series by ID, including soft-deleted ones
    async fn get(&self, id: SeriesId) -> Result<Option<PolicySeries>, PortError>;

    /// Retrieves a series by its code
    async fn find_by_code(&self, code: &str) -> Result<Option<PolicySeries>, PortError>;

    /// Finds stored series whose range intersects `start..=end`
    ///
    /// Soft-deleted series count: their issued numbers stay valid.
    async fn find_overlapping(
        &self,
        start: i64,
        end: i64,
        exclude: Option<SeriesId>,
    ) -> Result<Vec<PolicySeries>, PortError>;

    /// Lists series matching the query, ordered by code
    async fn list(&self, query: &SeriesQuery) -> Result<Vec<PolicySeries>, PortError>;

    /// Persists the snapshot if the stored version equals `expected_version`
    async fn commit(&self, commit: &SeriesCommit) -> Result<CommitOutcome, PortError>;

    /// Removes a series permanently if the stored version equals `expected_version`
    async fn remove(
        &self,
        id: SeriesId,
        expected_version: i64,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError>;

    /// Returns the full event trail of a series, oldest first
    async fn events(&self, id: SeriesId) -> Result<Vec<RecordedEvent>, PortError>;

    /// Returns the issuance log of a series, in issuance order
    async fn issuances(&self, id: SeriesId) -> Result<Vec<Issuance>, PortError>;

    /// Looks up the issuance record of a single number
    async fn find_issuance(
        &self,
        id: SeriesId,
        number: i64,
    ) -> Result<Option<Issuance>, PortError>;
}

/// The external dealer directory
#[async_trait]
pub trait DealerDirectory: DomainPort + HealthCheckable {
    /// Retrieves a dealer, or `None` if unknown
    async fn get_dealer(&self, id: DealerId) -> Result<Option<Dealer>, PortError>;
}

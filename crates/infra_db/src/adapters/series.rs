//! PostgreSQL Series Adapter
//!
//! `PostgresSeriesStore` implements the numbering domain's `SeriesStore`
//! port on top of [`SeriesRepository`]. It:
//!
//! - converts between domain aggregates and row types
//! - serializes events into the JSONB `payload` column
//! - turns constraint violations into commit outcomes
//!
//! # Constraint mapping
//!
//! | violation                          | outcome         |
//! |------------------------------------|-----------------|
//! | `policy_series_code_key` (23505)   | `DuplicateCode` |
//! | `policy_series_range_excl` (23P01) | `RangeOverlap`  |
//! | version predicate matched no row   | `VersionConflict` |

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, AuditEventId, DealerId, DomainPort, HealthCheckResult, HealthCheckable,
    PortError, SeriesId,
};
use domain_numbering::{
    CommitOutcome, Issuance, PolicySeries, RecordedEvent, SeriesCommit, SeriesEvent, SeriesQuery,
    SeriesRecord, SeriesStore,
};

use crate::error::DatabaseError;
use crate::repositories::series::{
    EventRow, IssuanceRow, SeriesRepository, SeriesRow, WriteResult,
};

const CODE_CONSTRAINT: &str = "policy_series_code_key";

/// PostgreSQL-backed implementation of the SeriesStore port
#[derive(Debug, Clone)]
pub struct PostgresSeriesStore {
    repository: SeriesRepository,
}

impl PostgresSeriesStore {
    /// Creates a new store over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: SeriesRepository::new(pool),
        }
    }

    /// Returns the underlying repository
    pub fn repository(&self) -> &SeriesRepository {
        &self.repository
    }
}

impl DomainPort for PostgresSeriesStore {}

#[async_trait]
impl HealthCheckable for PostgresSeriesStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = self.repository.ping().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(()) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: "postgres-series-store".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl SeriesStore for PostgresSeriesStore {
    #[instrument(skip(self, series, event), fields(series_id = %series.id()))]
    async fn insert(
        &self,
        series: &PolicySeries,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError> {
        let row = series_to_row(series);
        let event = event_to_row(event)?;
        let result = self
            .repository
            .insert(&row, &event)
            .await
            .map(|()| WriteResult::Applied);
        classify(result)
    }

    #[instrument(skip(self), fields(series_id = %id))]
    async fn get(&self, id: SeriesId) -> Result<Option<PolicySeries>, PortError> {
        debug!("Fetching series");
        self.repository
            .get(*id.as_uuid())
            .await?
            .map(series_from_row)
            .transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PolicySeries>, PortError> {
        self.repository
            .find_by_code(code)
            .await?
            .map(series_from_row)
            .transpose()
    }

    async fn find_overlapping(
        &self,
        start: i64,
        end: i64,
        exclude: Option<SeriesId>,
    ) -> Result<Vec<PolicySeries>, PortError> {
        let exclude = exclude.map(|id| *id.as_uuid());
        self.repository
            .find_overlapping(start, end, exclude)
            .await?
            .into_iter()
            .map(series_from_row)
            .collect()
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &SeriesQuery) -> Result<Vec<PolicySeries>, PortError> {
        self.repository
            .list(
                query.dealer_id.map(|id| *id.as_uuid()),
                query.include_deleted,
                query.limit.map(i64::from),
                i64::from(query.offset.unwrap_or(0)),
            )
            .await?
            .into_iter()
            .map(series_from_row)
            .collect()
    }

    #[instrument(
        skip(self, commit),
        fields(series_id = %commit.series.id(), expected_version = commit.expected_version)
    )]
    async fn commit(&self, commit: &SeriesCommit) -> Result<CommitOutcome, PortError> {
        let row = series_to_row(&commit.series);
        let event = event_to_row(&commit.event)?;
        let issuance = commit.event.as_issuance().map(issuance_to_row);

        let result = self
            .repository
            .update_if_version(&row, commit.expected_version, &event, issuance.as_ref())
            .await;
        classify(result)
    }

    #[instrument(skip(self, event), fields(series_id = %id))]
    async fn remove(
        &self,
        id: SeriesId,
        expected_version: i64,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError> {
        let event = event_to_row(event)?;
        let result = self
            .repository
            .delete_if_version(*id.as_uuid(), expected_version, &event)
            .await;
        classify(result)
    }

    async fn events(&self, id: SeriesId) -> Result<Vec<RecordedEvent>, PortError> {
        self.repository
            .events(*id.as_uuid())
            .await?
            .into_iter()
            .map(row_to_event)
            .collect()
    }

    async fn issuances(&self, id: SeriesId) -> Result<Vec<Issuance>, PortError> {
        Ok(self
            .repository
            .issuances(*id.as_uuid())
            .await?
            .into_iter()
            .map(row_to_issuance)
            .collect())
    }

    async fn find_issuance(
        &self,
        id: SeriesId,
        number: i64,
    ) -> Result<Option<Issuance>, PortError> {
        Ok(self
            .repository
            .find_issuance(*id.as_uuid(), number)
            .await?
            .map(row_to_issuance))
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn classify(result: Result<WriteResult, DatabaseError>) -> Result<CommitOutcome, PortError> {
    match result {
        Ok(WriteResult::Applied) => Ok(CommitOutcome::Committed),
        Ok(WriteResult::Stale) => Ok(CommitOutcome::VersionConflict),
        Err(e) if e.is_unique_violation_of(CODE_CONSTRAINT) => Ok(CommitOutcome::DuplicateCode),
        Err(DatabaseError::RangeOverlap(_)) => Ok(CommitOutcome::RangeOverlap),
        Err(e) => Err(e.into()),
    }
}

fn series_to_row(series: &PolicySeries) -> SeriesRow {
    let record = series.to_record();
    SeriesRow {
        series_id: record.id.into(),
        series: record.series,
        dealer_id: record.dealer_id.into(),
        description: record.description,
        start_number: record.start_number,
        end_number: record.end_number,
        current_number: record.current_number,
        number_width: record.number_width as i32,
        version: record.version,
        created_at: record.created_at,
        updated_at: record.updated_at,
        deleted_at: record.deleted_at,
    }
}

fn series_from_row(row: SeriesRow) -> Result<PolicySeries, PortError> {
    let number_width = u32::try_from(row.number_width).map_err(|_| {
        PortError::transformation(format!("negative number width {}", row.number_width))
    })?;

    PolicySeries::rehydrate(SeriesRecord {
        id: SeriesId::from(row.series_id),
        series: row.series,
        dealer_id: DealerId::from(row.dealer_id),
        description: row.description,
        start_number: row.start_number,
        end_number: row.end_number,
        current_number: row.current_number,
        number_width,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
        deleted_at: row.deleted_at,
    })
    .map_err(|e| PortError::transformation(e.to_string()))
}

fn event_to_row(event: &SeriesEvent) -> Result<EventRow, PortError> {
    let payload = serde_json::to_value(event)
        .map_err(|e| PortError::transformation(format!("cannot encode event: {}", e)))?;
    Ok(EventRow {
        event_id: AuditEventId::new_v7().into(),
        series_id: event.series_id().into(),
        event_type: event.event_type().to_string(),
        payload,
        occurred_at: event.timestamp(),
    })
}

fn row_to_event(row: EventRow) -> Result<RecordedEvent, PortError> {
    let event = serde_json::from_value(row.payload).map_err(|e| {
        PortError::transformation(format!("cannot decode event {}: {}", row.event_id, e))
    })?;
    Ok(RecordedEvent {
        id: AuditEventId::from(row.event_id),
        event,
    })
}

fn issuance_to_row(issuance: &Issuance) -> IssuanceRow {
    IssuanceRow {
        series_id: issuance.series_id.into(),
        issued_number: issuance.issued_number,
        dealer_id: issuance.dealer_id_at_issuance.into(),
        issued_at: issuance.issued_at,
    }
}

fn row_to_issuance(row: IssuanceRow) -> Issuance {
    Issuance {
        series_id: SeriesId::from(row.series_id),
        issued_number: row.issued_number,
        dealer_id_at_issuance: DealerId::from(row.dealer_id),
        issued_at: row.issued_at,
    }
}

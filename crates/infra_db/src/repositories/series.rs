//! Policy series repository implementation
//!
//! Row-level access to `policy_series`, `series_events` and
//! `series_issuances`. Every write that changes a series also appends its
//! event inside the same transaction, and every update is conditional on
//! the version the caller read.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

const SERIES_COLUMNS: &str = r#"
    series_id, series, dealer_id, description,
    start_number, end_number, current_number, number_width,
    version, created_at, updated_at, deleted_at
"#;

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Applied,
    /// The row is missing or its version moved on
    Stale,
}

/// Repository for policy series rows
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::repositories::SeriesRepository;
///
/// let repo = SeriesRepository::new(pool);
/// let row = repo.get(series_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SeriesRepository {
    pool: PgPool,
}

impl SeriesRepository {
    /// Creates a new SeriesRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new series together with its creation event
    pub async fn insert(&self, row: &SeriesRow, event: &EventRow) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO policy_series (
                series_id, series, dealer_id, description,
                start_number, end_number, current_number, number_width,
                version, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(row.series_id)
        .bind(&row.series)
        .bind(row.dealer_id)
        .bind(&row.description)
        .bind(row.start_number)
        .bind(row.end_number)
        .bind(row.current_number)
        .bind(row.number_width)
        .bind(row.version)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.deleted_at)
        .execute(&mut *tx)
        .await?;

        append_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Retrieves a series row by ID
    pub async fn get(&self, series_id: Uuid) -> Result<Option<SeriesRow>, DatabaseError> {
        let sql = format!("SELECT {SERIES_COLUMNS} FROM policy_series WHERE series_id = $1");
        let row = sqlx::query_as::<_, SeriesRow>(&sql)
            .bind(series_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Retrieves a series row by its code
    pub async fn find_by_code(&self, code: &str) -> Result<Option<SeriesRow>, DatabaseError> {
        let sql = format!("SELECT {SERIES_COLUMNS} FROM policy_series WHERE series = $1");
        let row = sqlx::query_as::<_, SeriesRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Finds series whose inclusive range intersects `start..=end`
    pub async fn find_overlapping(
        &self,
        start: i64,
        end: i64,
        exclude: Option<Uuid>,
    ) -> Result<Vec<SeriesRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {SERIES_COLUMNS} FROM policy_series
            WHERE start_number <= $2 AND end_number >= $1
              AND ($3::uuid IS NULL OR series_id <> $3)
            ORDER BY start_number
            "#
        );
        let rows = sqlx::query_as::<_, SeriesRow>(&sql)
            .bind(start)
            .bind(end)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Lists series ordered by code
    pub async fn list(
        &self,
        dealer_id: Option<Uuid>,
        include_deleted: bool,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<SeriesRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {SERIES_COLUMNS} FROM policy_series
            WHERE ($1::uuid IS NULL OR dealer_id = $1)
              AND ($2 OR deleted_at IS NULL)
            ORDER BY series
            LIMIT $3 OFFSET $4
            "#
        );
        let rows = sqlx::query_as::<_, SeriesRow>(&sql)
            .bind(dealer_id)
            .bind(include_deleted)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Writes a new snapshot if the stored version equals `expected_version`
    ///
    /// The event, and the issuance if there is one, are appended in the
    /// same transaction. Nothing is written when the version is stale.
    pub async fn update_if_version(
        &self,
        row: &SeriesRow,
        expected_version: i64,
        event: &EventRow,
        issuance: Option<&IssuanceRow>,
    ) -> Result<WriteResult, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE policy_series
            SET series = $3,
                dealer_id = $4,
                description = $5,
                start_number = $6,
                end_number = $7,
                current_number = $8,
                number_width = $9,
                version = $10,
                updated_at = $11,
                deleted_at = $12
            WHERE series_id = $1 AND version = $2
            "#,
        )
        .bind(row.series_id)
        .bind(expected_version)
        .bind(&row.series)
        .bind(row.dealer_id)
        .bind(&row.description)
        .bind(row.start_number)
        .bind(row.end_number)
        .bind(row.current_number)
        .bind(row.number_width)
        .bind(row.version)
        .bind(row.updated_at)
        .bind(row.deleted_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(WriteResult::Stale);
        }

        append_event(&mut tx, event).await?;
        if let Some(issuance) = issuance {
            sqlx::query(
                r#"
                INSERT INTO series_issuances (series_id, issued_number, dealer_id, issued_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(issuance.series_id)
            .bind(issuance.issued_number)
            .bind(issuance.dealer_id)
            .bind(issuance.issued_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(WriteResult::Applied)
    }

    /// Deletes a series row if the stored version equals `expected_version`
    pub async fn delete_if_version(
        &self,
        series_id: Uuid,
        expected_version: i64,
        event: &EventRow,
    ) -> Result<WriteResult, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM policy_series WHERE series_id = $1 AND version = $2")
            .bind(series_id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(WriteResult::Stale);
        }

        append_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(WriteResult::Applied)
    }

    /// Event trail of a series, oldest first
    pub async fn events(&self, series_id: Uuid) -> Result<Vec<EventRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, series_id, event_type, payload, occurred_at
            FROM series_events
            WHERE series_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Issuance log of a series in issuance order
    pub async fn issuances(&self, series_id: Uuid) -> Result<Vec<IssuanceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, IssuanceRow>(
            r#"
            SELECT series_id, issued_number, dealer_id, issued_at
            FROM series_issuances
            WHERE series_id = $1
            ORDER BY issued_number
            "#,
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Issuance record of one number
    pub async fn find_issuance(
        &self,
        series_id: Uuid,
        issued_number: i64,
    ) -> Result<Option<IssuanceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, IssuanceRow>(
            r#"
            SELECT series_id, issued_number, dealer_id, issued_at
            FROM series_issuances
            WHERE series_id = $1 AND issued_number = $2
            "#,
        )
        .bind(series_id)
        .bind(issued_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Round-trips a trivial query
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

async fn append_event(
    tx: &mut Transaction<'_, Postgres>,
    event: &EventRow,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO series_events (event_id, series_id, event_type, payload, occurred_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(event.event_id)
    .bind(event.series_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(event.occurred_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Row in `policy_series`
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SeriesRow {
    pub series_id: Uuid,
    pub series: String,
    pub dealer_id: Uuid,
    pub description: Option<String>,
    pub start_number: i64,
    pub end_number: i64,
    pub current_number: i64,
    pub number_width: i32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row in `series_events`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EventRow {
    pub event_id: Uuid,
    pub series_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Row in `series_issuances`
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IssuanceRow {
    pub series_id: Uuid,
    pub issued_number: i64,
    pub dealer_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

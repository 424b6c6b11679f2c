//! Dealer repository implementation
//!
//! The numbering service only reads dealers; `insert` and `set_status`
//! exist for provisioning and tests.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Repository for dealer rows
#[derive(Debug, Clone)]
pub struct DealerRepository {
    pool: PgPool,
}

impl DealerRepository {
    /// Creates a new DealerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a dealer by ID
    pub async fn get(&self, dealer_id: Uuid) -> Result<Option<DealerRow>, DatabaseError> {
        let row = sqlx::query_as::<_, DealerRow>(
            "SELECT dealer_id, name, status, created_at FROM dealers WHERE dealer_id = $1",
        )
        .bind(dealer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Inserts or replaces a dealer
    pub async fn upsert(&self, row: &DealerRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO dealers (dealer_id, name, status, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (dealer_id) DO UPDATE
            SET name = EXCLUDED.name, status = EXCLUDED.status
            "#,
        )
        .bind(row.dealer_id)
        .bind(&row.name)
        .bind(row.status)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Changes a dealer's status
    pub async fn set_status(
        &self,
        dealer_id: Uuid,
        status: DealerStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE dealers SET status = $2 WHERE dealer_id = $1")
            .bind(dealer_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Dealer", dealer_id));
        }
        Ok(())
    }

    /// Round-trips a trivial query
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// Dealer status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "dealer_status", rename_all = "snake_case")]
pub enum DealerStatus {
    Active,
    Inactive,
    Suspended,
}

/// Row in `dealers`
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DealerRow {
    pub dealer_id: Uuid,
    pub name: String,
    pub status: DealerStatus,
    pub created_at: DateTime<Utc>,
}

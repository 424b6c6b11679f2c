//! PostgreSQL Dealer Adapter
//!
//! Implements the `DealerDirectory` port over the `dealers` table.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{AdapterHealth, DealerId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_numbering::{Dealer, DealerDirectory, DealerStatus};

use crate::repositories::dealer::{DealerRepository, DealerRow, DealerStatus as DbDealerStatus};

/// PostgreSQL-backed implementation of the DealerDirectory port
#[derive(Debug, Clone)]
pub struct PostgresDealerDirectory {
    repository: DealerRepository,
}

impl PostgresDealerDirectory {
    /// Creates a new directory over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: DealerRepository::new(pool),
        }
    }

    /// Inserts or replaces a dealer
    pub async fn upsert(&self, dealer: &Dealer) -> Result<(), PortError> {
        self.repository.upsert(&dealer_to_row(dealer)).await?;
        Ok(())
    }

    /// Changes a dealer's status
    pub async fn set_status(&self, id: DealerId, status: DealerStatus) -> Result<(), PortError> {
        self.repository
            .set_status(*id.as_uuid(), domain_to_db_status(status))
            .await?;
        Ok(())
    }
}

impl DomainPort for PostgresDealerDirectory {}

#[async_trait]
impl HealthCheckable for PostgresDealerDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = self.repository.ping().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(()) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: "postgres-dealer-directory".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl DealerDirectory for PostgresDealerDirectory {
    #[instrument(skip(self), fields(dealer_id = %id))]
    async fn get_dealer(&self, id: DealerId) -> Result<Option<Dealer>, PortError> {
        Ok(self.repository.get(*id.as_uuid()).await?.map(row_to_dealer))
    }
}

fn row_to_dealer(row: DealerRow) -> Dealer {
    Dealer {
        id: DealerId::from(row.dealer_id),
        name: row.name,
        status: match row.status {
            DbDealerStatus::Active => DealerStatus::Active,
            DbDealerStatus::Inactive => DealerStatus::Inactive,
            DbDealerStatus::Suspended => DealerStatus::Suspended,
        },
        created_at: row.created_at,
    }
}

fn dealer_to_row(dealer: &Dealer) -> DealerRow {
    DealerRow {
        dealer_id: *dealer.id.as_uuid(),
        name: dealer.name.clone(),
        status: domain_to_db_status(dealer.status),
        created_at: dealer.created_at,
    }
}

fn domain_to_db_status(status: DealerStatus) -> DbDealerStatus {
    match status {
        DealerStatus::Active => DbDealerStatus::Active,
        DealerStatus::Inactive => DbDealerStatus::Inactive,
        DealerStatus::Suspended => DbDealerStatus::Suspended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_round_trips() {
        let dealer = Dealer::new("Harbour Auto").with_status(DealerStatus::Suspended);
        let back = row_to_dealer(dealer_to_row(&dealer));
        assert_eq!(back.id, dealer.id);
        assert_eq!(back.status, DealerStatus::Suspended);
        assert!(!back.can_own_series());
    }
}

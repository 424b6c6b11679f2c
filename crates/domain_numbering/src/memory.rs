//! In-memory adapters
//!
//! `InMemorySeriesStore` satisfies the [`SeriesStore`] contract for
//! single-instance deployments and tests. All state sits behind one
//! `RwLock`; each operation holds it only for the duration of a map update,
//! so per-series serialization still comes from the allocator's locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use core_kernel::{
    DealerId, DomainPort, HealthCheckResult, HealthCheckable, PortError, SeriesId,
};

use crate::dealer::{Dealer, DealerStatus};
use crate::events::{Issuance, RecordedEvent, SeriesEvent};
use crate::ports::{CommitOutcome, DealerDirectory, SeriesCommit, SeriesQuery, SeriesStore};
use crate::series::PolicySeries;

#[derive(Debug, Default)]
struct StoreState {
    series: HashMap<SeriesId, PolicySeries>,
    events: Vec<RecordedEvent>,
    issuances: HashMap<(SeriesId, i64), Issuance>,
}

impl StoreState {
    fn code_taken(&self, code: &str, exclude: Option<SeriesId>) -> bool {
        self.series
            .values()
            .any(|s| Some(s.id()) != exclude && s.series() == code)
    }

    fn range_taken(&self, start: i64, end: i64, exclude: Option<SeriesId>) -> bool {
        self.series
            .values()
            .any(|s| Some(s.id()) != exclude && s.overlaps(start, end))
    }

    fn append(&mut self, event: &SeriesEvent) {
        if let Some(issuance) = event.as_issuance() {
            self.issuances
                .insert((issuance.series_id, issuance.issued_number), issuance.clone());
        }
        self.events.push(RecordedEvent::new(event.clone()));
    }
}

/// In-memory implementation of SeriesStore
#[derive(Debug, Default, Clone)]
pub struct InMemorySeriesStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemorySeriesStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemorySeriesStore {}

#[async_trait]
impl HealthCheckable for InMemorySeriesStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in-memory-series-store")
    }
}

#[async_trait]
impl SeriesStore for InMemorySeriesStore {
    async fn insert(
        &self,
        series: &PolicySeries,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError> {
        let mut state = self.state.write().await;

        if state.series.contains_key(&series.id()) {
            return Err(PortError::conflict(format!("series {} already stored", series.id())));
        }
        if state.code_taken(series.series(), None) {
            return Ok(CommitOutcome::DuplicateCode);
        }
        if state.range_taken(series.start_number(), series.end_number(), None) {
            return Ok(CommitOutcome::RangeOverlap);
        }

        state.series.insert(series.id(), series.clone());
        state.append(event);
        Ok(CommitOutcome::Committed)
    }

    async fn get(&self, id: SeriesId) -> Result<Option<PolicySeries>, PortError> {
        Ok(self.state.read().await.series.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PolicySeries>, PortError> {
        let state = self.state.read().await;
        Ok(state.series.values().find(|s| s.series() == code).cloned())
    }

    async fn find_overlapping(
        &self,
        start: i64,
        end: i64,
        exclude: Option<SeriesId>,
    ) -> Result<Vec<PolicySeries>, PortError> {
        let state = self.state.read().await;
        Ok(state
            .series
            .values()
            .filter(|s| Some(s.id()) != exclude && s.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn list(&self, query: &SeriesQuery) -> Result<Vec<PolicySeries>, PortError> {
        let state = self.state.read().await;
        let mut results: Vec<_> = state
            .series
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.series().cmp(b.series()));

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(results.into_iter().skip(offset).take(limit).collect())
    }

    async fn commit(&self, commit: &SeriesCommit) -> Result<CommitOutcome, PortError> {
        let mut state = self.state.write().await;
        let id = commit.series.id();

        let (code_changed, range_changed) = match state.series.get(&id) {
            Some(stored) if stored.version() == commit.expected_version => (
                stored.series() != commit.series.series(),
                stored.start_number() != commit.series.start_number()
                    || stored.end_number() != commit.series.end_number(),
            ),
            _ => return Ok(CommitOutcome::VersionConflict),
        };

        if code_changed && state.code_taken(commit.series.series(), Some(id)) {
            return Ok(CommitOutcome::DuplicateCode);
        }
        if range_changed
            && state.range_taken(commit.series.start_number(), commit.series.end_number(), Some(id))
        {
            return Ok(CommitOutcome::RangeOverlap);
        }

        state.series.insert(id, commit.series.clone());
        state.append(&commit.event);
        Ok(CommitOutcome::Committed)
    }

    async fn remove(
        &self,
        id: SeriesId,
        expected_version: i64,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError> {
        let mut state = self.state.write().await;
        match state.series.get(&id) {
            Some(stored) if stored.version() == expected_version => {}
            _ => return Ok(CommitOutcome::VersionConflict),
        }
        state.series.remove(&id);
        state.append(event);
        Ok(CommitOutcome::Committed)
    }

    async fn events(&self, id: SeriesId) -> Result<Vec<RecordedEvent>, PortError> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.event.series_id() == id)
            .cloned()
            .collect())
    }

    async fn issuances(&self, id: SeriesId) -> Result<Vec<Issuance>, PortError> {
        let state = self.state.read().await;
        let mut log: Vec<_> = state
            .issuances
            .values()
            .filter(|i| i.series_id == id)
            .cloned()
            .collect();
        log.sort_by_key(|i| i.issued_number);
        Ok(log)
    }

    async fn find_issuance(
        &self,
        id: SeriesId,
        number: i64,
    ) -> Result<Option<Issuance>, PortError> {
        Ok(self.state.read().await.issuances.get(&(id, number)).cloned())
    }
}

/// In-memory implementation of DealerDirectory
#[derive(Debug, Default, Clone)]
pub struct InMemoryDealerDirectory {
    dealers: Arc<RwLock<HashMap<DealerId, Dealer>>>,
}

impl InMemoryDealerDirectory {
    /// Creates an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates with dealers
    pub async fn with_dealers(dealers: Vec<Dealer>) -> Self {
        let directory = Self::new();
        for dealer in dealers {
            directory.upsert(dealer).await;
        }
        directory
    }

    /// Adds or replaces a dealer
    pub async fn upsert(&self, dealer: Dealer) {
        self.dealers.write().await.insert(dealer.id, dealer);
    }

    /// Changes a dealer's status
    pub async fn set_status(&self, id: DealerId, status: DealerStatus) -> Result<(), PortError> {
        let mut dealers = self.dealers.write().await;
        let dealer = dealers
            .get_mut(&id)
            .ok_or_else(|| PortError::not_found("Dealer", id))?;
        dealer.status = status;
        Ok(())
    }
}

impl DomainPort for InMemoryDealerDirectory {}

#[async_trait]
impl HealthCheckable for InMemoryDealerDirectory {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in-memory-dealer-directory")
    }
}

#[async_trait]
impl DealerDirectory for InMemoryDealerDirectory {
    async fn get_dealer(&self, id: DealerId) -> Result<Option<Dealer>, PortError> {
        Ok(self.dealers.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::NewSeries;
    use chrono::Utc;

    fn series(code: &str, start: i64, end: i64) -> PolicySeries {
        PolicySeries::create(
            NewSeries {
                series: code.to_string(),
                dealer_id: DealerId::new(),
                description: None,
                start_number: start,
                end_number: end,
            },
            6,
        )
        .unwrap()
    }

    fn created(series: &PolicySeries) -> SeriesEvent {
        SeriesEvent::SeriesCreated {
            series_id: series.id(),
            series: series.series().to_string(),
            dealer_id: series.dealer_id(),
            start_number: series.start_number(),
            end_number: series.end_number(),
            initiated_by: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_code_and_overlap() {
        let store = InMemorySeriesStore::new();
        let first = series("MTR", 1, 100);
        assert_eq!(store.insert(&first, &created(&first)).await.unwrap(), CommitOutcome::Committed);

        let same_code = series("MTR", 500, 600);
        assert_eq!(
            store.insert(&same_code, &created(&same_code)).await.unwrap(),
            CommitOutcome::DuplicateCode
        );

        let overlapping = series("CAR", 100, 200);
        assert_eq!(
            store.insert(&overlapping, &created(&overlapping)).await.unwrap(),
            CommitOutcome::RangeOverlap
        );
    }

    #[tokio::test]
    async fn test_commit_with_stale_version_is_rejected() {
        let store = InMemorySeriesStore::new();
        let original = series("MTR", 1, 100);
        store.insert(&original, &created(&original)).await.unwrap();

        let mut winner = original.clone();
        let issued = winner.issue_next(Utc::now()).unwrap();
        let event = SeriesEvent::NumberIssued(Issuance {
            series_id: winner.id(),
            issued_number: issued,
            dealer_id_at_issuance: winner.dealer_id(),
            issued_at: Utc::now(),
        });
        let commit = SeriesCommit::new(winner, original.version(), event);

        assert_eq!(store.commit(&commit).await.unwrap(), CommitOutcome::Committed);
        assert_eq!(store.commit(&commit).await.unwrap(), CommitOutcome::VersionConflict);
        assert_eq!(store.issuances(original.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dealer_directory_status_change() {
        let dealer = Dealer::new("Northside Motors");
        let directory = InMemoryDealerDirectory::with_dealers(vec![dealer.clone()]).await;

        directory.set_status(dealer.id, DealerStatus::Suspended).await.unwrap();
        let fetched = directory.get_dealer(dealer.id).await.unwrap().unwrap();
        assert!(!fetched.can_own_series());

        let missing = directory.set_status(DealerId::new(), DealerStatus::Active).await;
        assert!(missing.unwrap_err().is_not_found());
    }
}

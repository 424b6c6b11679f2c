//! Concurrency Tests
//!
//! Issuance under contention: many tasks on a multi-threaded runtime hit
//! the same series, and a store wrapper simulates other processes winning
//! the version race.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_kernel::{
    DealerId, DomainPort, HealthCheckResult, HealthCheckable, OperationMetadata, PortError,
    SeriesId,
};
use domain_numbering::{
    AllocatorConfig, CommitOutcome, Dealer, InMemoryDealerDirectory, InMemorySeriesStore,
    Issuance, NewSeries, NumberingError, PolicySeries, PolicySeriesAllocator, RecordedEvent,
    SeriesCommit, SeriesEvent, SeriesQuery, SeriesStore,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// How a failing commit misbehaves
#[derive(Debug, Clone, Copy)]
enum CommitFailure {
    /// Another process won the version race; nothing written
    LostRace,
    /// The connection dropped before the write; nothing written
    Transient,
    /// The write was applied but the acknowledgement was lost
    LostAck,
}

/// Store wrapper that makes the next `fail_commits` commits fail before
/// (or after) delegating
struct ContendedStore {
    inner: InMemorySeriesStore,
    fail_commits: AtomicU32,
    failure: CommitFailure,
    commit_calls: AtomicU32,
    /// Reads to fail after the next applied commit
    reads_failing_after_commit: u32,
    failing_reads: AtomicU32,
}

impl ContendedStore {
    fn new(fail_commits: u32, failure: CommitFailure) -> Self {
        Self {
            inner: InMemorySeriesStore::new(),
            fail_commits: AtomicU32::new(fail_commits),
            failure,
            commit_calls: AtomicU32::new(0),
            reads_failing_after_commit: 0,
            failing_reads: AtomicU32::new(0),
        }
    }

    fn failing_reads_after_commit(mut self, reads: u32) -> Self {
        self.reads_failing_after_commit = reads;
        self
    }
}

impl DomainPort for ContendedStore {}

#[async_trait]
impl HealthCheckable for ContendedStore {
    async fn health_check(&self) -> HealthCheckResult {
        self.inner.health_check().await
    }
}

#[async_trait]
impl SeriesStore for ContendedStore {
    async fn insert(
        &self,
        series: &PolicySeries,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError> {
        self.inner.insert(series, event).await
    }

    async fn get(&self, id: SeriesId) -> Result<Option<PolicySeries>, PortError> {
        let failing = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PortError::connection("connection reset by peer"));
        }
        self.inner.get(id).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PolicySeries>, PortError> {
        self.inner.find_by_code(code).await
    }

    async fn find_overlapping(
        &self,
        start: i64,
        end: i64,
        exclude: Option<SeriesId>,
    ) -> Result<Vec<PolicySeries>, PortError> {
        self.inner.find_overlapping(start, end, exclude).await
    }

    async fn list(&self, query: &SeriesQuery) -> Result<Vec<PolicySeries>, PortError> {
        self.inner.list(query).await
    }

    async fn commit(&self, commit: &SeriesCommit) -> Result<CommitOutcome, PortError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            match self.failure {
                CommitFailure::LostRace => return Ok(CommitOutcome::VersionConflict),
                CommitFailure::Transient => {
                    return Err(PortError::connection("connection reset by peer"))
                }
                CommitFailure::LostAck => {
                    self.inner.commit(commit).await?;
                    return Err(PortError::connection("connection reset by peer"));
                }
            }
        }

        let outcome = self.inner.commit(commit).await?;
        if outcome == CommitOutcome::Committed {
            self.failing_reads
                .store(self.reads_failing_after_commit, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    async fn remove(
        &self,
        id: SeriesId,
        expected_version: i64,
        event: &SeriesEvent,
    ) -> Result<CommitOutcome, PortError> {
        self.inner.remove(id, expected_version, event).await
    }

    async fn events(&self, id: SeriesId) -> Result<Vec<RecordedEvent>, PortError> {
        self.inner.events(id).await
    }

    async fn issuances(&self, id: SeriesId) -> Result<Vec<Issuance>, PortError> {
        self.inner.issuances(id).await
    }

    async fn find_issuance(
        &self,
        id: SeriesId,
        number: i64,
    ) -> Result<Option<Issuance>, PortError> {
        self.inner.find_issuance(id, number).await
    }
}

fn fast_config() -> AllocatorConfig {
    AllocatorConfig::default().with_retry_backoff(Duration::from_millis(1))
}

async fn allocator_over(store: Arc<dyn SeriesStore>) -> (Arc<PolicySeriesAllocator>, DealerId) {
    let dealer = Dealer::new("Riverside Cars");
    let dealers = InMemoryDealerDirectory::with_dealers(vec![dealer.clone()]).await;
    let allocator = PolicySeriesAllocator::new(store, Arc::new(dealers), fast_config());
    (Arc::new(allocator), dealer.id)
}

async fn create(
    allocator: &PolicySeriesAllocator,
    dealer_id: DealerId,
    code: &str,
    start: i64,
    end: i64,
) -> SeriesId {
    allocator
        .create_series(
            NewSeries {
                series: code.to_string(),
                dealer_id,
                description: None,
                start_number: start,
                end_number: end,
            },
            &OperationMetadata::default(),
        )
        .await
        .unwrap()
        .id()
}

// ============================================================================
// CONTENTION
// ============================================================================

mod contention {
    use super::*;

    /// N concurrent callers receive exactly start..start+N
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_issuance_is_gapless_and_unique() {
        let (allocator, dealer_id) = allocator_over(Arc::new(InMemorySeriesStore::new())).await;
        let id = create(&allocator, dealer_id, "MTR", 1000, 9999).await;

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.get_next_number(id).await })
            })
            .collect();

        let mut issued = HashSet::new();
        for handle in handles {
            assert!(issued.insert(handle.await.unwrap().unwrap()));
        }

        let expected: HashSet<i64> = (1000..1200).collect();
        assert_eq!(issued, expected);

        let stats = allocator.get_series_statistics(id).await.unwrap();
        assert_eq!(stats.used, 200);
        assert_eq!(stats.current_number, 1200);
    }

    /// With one number left, exactly one racer wins
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_number_has_single_winner() {
        let (allocator, dealer_id) = allocator_over(Arc::new(InMemorySeriesStore::new())).await;
        let id = create(&allocator, dealer_id, "MTR", 1, 3).await;
        allocator.get_next_number(id).await.unwrap();
        allocator.get_next_number(id).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.get_next_number(id).await })
            })
            .collect();

        let mut winners = Vec::new();
        let mut depleted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(number) => winners.push(number),
                Err(NumberingError::SeriesDepleted { .. }) => depleted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners, vec![3]);
        assert_eq!(depleted, 15);
    }

    /// Series are independent: each sees its own consecutive numbers
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_series_do_not_interfere() {
        let (allocator, dealer_id) = allocator_over(Arc::new(InMemorySeriesStore::new())).await;
        let a = create(&allocator, dealer_id, "A", 1, 1000).await;
        let b = create(&allocator, dealer_id, "B", 5001, 6000).await;

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let allocator = allocator.clone();
                let id = if i % 2 == 0 { a } else { b };
                tokio::spawn(async move { (id, allocator.get_next_number(id).await.unwrap()) })
            })
            .collect();

        let mut from_a = Vec::new();
        let mut from_b = Vec::new();
        for handle in handles {
            let (id, number) = handle.await.unwrap();
            if id == a {
                from_a.push(number);
            } else {
                from_b.push(number);
            }
        }
        from_a.sort_unstable();
        from_b.sort_unstable();

        assert_eq!(from_a, (1..=50).collect::<Vec<_>>());
        assert_eq!(from_b, (5001..=5050).collect::<Vec<_>>());
    }
}

// ============================================================================
// RETRIES
// ============================================================================

mod retries {
    use super::*;

    /// Lost races are retried transparently
    #[tokio::test]
    async fn test_lost_races_are_retried() {
        let store = Arc::new(ContendedStore::new(3, CommitFailure::LostRace));
        let (allocator, dealer_id) = allocator_over(store.clone()).await;
        let id = create(&allocator, dealer_id, "MTR", 1, 10).await;

        assert_eq!(allocator.get_next_number(id).await.unwrap(), 1);
        assert_eq!(store.commit_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = Arc::new(ContendedStore::new(2, CommitFailure::Transient));
        let (allocator, dealer_id) = allocator_over(store.clone()).await;
        let id = create(&allocator, dealer_id, "MTR", 1, 10).await;

        assert_eq!(allocator.get_next_number(id).await.unwrap(), 1);
    }

    /// Exhausted budget surfaces a retryable conflict and consumes nothing
    #[tokio::test]
    async fn test_exhausted_retries_surface_conflict() {
        let store = Arc::new(ContendedStore::new(5, CommitFailure::LostRace));
        let (allocator, dealer_id) = allocator_over(store.clone()).await;
        let id = create(&allocator, dealer_id, "MTR", 1, 10).await;

        let err = allocator.get_next_number(id).await.unwrap_err();
        assert!(matches!(err, NumberingError::AllocationConflict { attempts: 5, .. }));
        assert!(err.is_retryable());

        let stats = allocator.get_series_statistics(id).await.unwrap();
        assert_eq!(stats.used, 0);
        assert!(allocator.issuance_history(id).await.unwrap().is_empty());

        // The next caller gets the number nobody consumed
        assert_eq!(allocator.get_next_number(id).await.unwrap(), 1);
    }

    /// A commit applied despite a dropped connection is reported, not reissued
    #[tokio::test]
    async fn test_applied_commit_with_lost_ack_is_returned() {
        let store = Arc::new(ContendedStore::new(1, CommitFailure::LostAck));
        let (allocator, dealer_id) = allocator_over(store.clone()).await;
        let id = create(&allocator, dealer_id, "MTR", 1000, 1004).await;

        assert_eq!(allocator.get_next_number(id).await.unwrap(), 1000);
        assert_eq!(store.commit_calls.load(Ordering::SeqCst), 1);

        let issued: Vec<i64> = allocator
            .issuance_history(id)
            .await
            .unwrap()
            .iter()
            .map(|i| i.issued_number)
            .collect();
        assert_eq!(issued, vec![1000]);
        assert_eq!(allocator.get_next_number(id).await.unwrap(), 1001);
    }

    /// An applied non-issuing write with a lost ack is not applied twice
    #[tokio::test]
    async fn test_lost_ack_on_extension_is_reconciled() {
        let store = Arc::new(ContendedStore::new(1, CommitFailure::LostAck));
        let (allocator, dealer_id) = allocator_over(store.clone()).await;
        let id = create(&allocator, dealer_id, "MTR", 1, 10).await;

        let series = allocator
            .extend_range(id, 20, "campaign", &OperationMetadata::default())
            .await
            .unwrap();
        assert_eq!(series.end_number(), 20);

        let extensions = allocator
            .series_events(id)
            .await
            .unwrap()
            .iter()
            .filter(|e| e.event.event_type() == "range_extended")
            .count();
        assert_eq!(extensions, 1);
    }

    /// A failing read after the commit cannot lose the issued policy number
    #[tokio::test]
    async fn test_policy_number_survives_read_failure_after_commit() {
        let store = Arc::new(
            ContendedStore::new(0, CommitFailure::Transient).failing_reads_after_commit(1),
        );
        let (allocator, dealer_id) = allocator_over(store.clone()).await;
        let id = create(&allocator, dealer_id, "MTR", 1000, 1004).await;

        let issued = allocator.generate_full_policy_number(id).await.unwrap();
        assert_eq!(issued.issued_number, 1000);
        assert_eq!(issued.policy_number, "MTR001000");
        assert_eq!(issued.series, "MTR");
    }
}

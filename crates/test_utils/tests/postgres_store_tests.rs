//! PostgreSQL Adapter Integration Tests
//!
//! Runs the allocator over the SQL adapters against a real PostgreSQL
//! container. Requires Docker; run with `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use core_kernel::SeriesId;
use domain_numbering::{
    AllocatorConfig, Dealer, DealerStatus, DeletionOutcome, NumberingError, PolicySeriesAllocator,
    SeriesQuery,
};
use infra_db::{PostgresDealerDirectory, PostgresSeriesStore};
use test_utils::{
    assert_consecutive_from, assert_event_types, create_isolated_test_database, DealerFixtures,
    MetadataFixtures, NewSeriesBuilder, TestDatabase,
};

struct PgHarness {
    _db: TestDatabase,
    allocator: Arc<PolicySeriesAllocator>,
    directory: PostgresDealerDirectory,
    dealer: Dealer,
}

async fn harness() -> PgHarness {
    let db = create_isolated_test_database()
        .await
        .expect("Failed to start PostgreSQL container");

    let directory = PostgresDealerDirectory::new(db.pool().clone());
    let dealer = DealerFixtures::active();
    directory.upsert(&dealer).await.unwrap();

    let allocator = PolicySeriesAllocator::new(
        Arc::new(PostgresSeriesStore::new(db.pool().clone())),
        Arc::new(directory.clone()),
        // A hundred callers queue on one series lock
        AllocatorConfig::default().with_lock_timeout(Duration::from_secs(30)),
    );

    PgHarness {
        _db: db,
        allocator: Arc::new(allocator),
        directory,
        dealer,
    }
}

async fn create(h: &PgHarness, code: &str, start: i64, end: i64) -> SeriesId {
    h.allocator
        .create_series(
            NewSeriesBuilder::new(h.dealer.id)
                .with_code(code)
                .with_range(start, end)
                .build(),
            &MetadataFixtures::admin(),
        )
        .await
        .unwrap()
        .id()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_issues_until_depleted() {
    let h = harness().await;
    let id = create(&h, "MTR", 1000, 1004).await;

    let mut issued = Vec::new();
    for _ in 0..5 {
        issued.push(h.allocator.get_next_number(id).await.unwrap());
    }
    assert_eq!(issued, vec![1000, 1001, 1002, 1003, 1004]);

    let err = h.allocator.get_next_number(id).await.unwrap_err();
    assert!(matches!(err, NumberingError::SeriesDepleted { .. }));

    let stats = h.allocator.get_series_statistics(id).await.unwrap();
    assert_eq!(stats.remaining, 0);
    assert_eq!(stats.usage_percentage, 100);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_concurrent_issuance_is_gap_free() {
    let h = harness().await;
    let id = create(&h, "CNC", 1, 10_000).await;

    let mut handles = Vec::new();
    for _ in 0..100 {
        let allocator = Arc::clone(&h.allocator);
        handles.push(tokio::spawn(async move { allocator.get_next_number(id).await }));
    }

    let mut issued = Vec::new();
    for handle in handles {
        issued.push(handle.await.unwrap().unwrap());
    }
    assert_consecutive_from(&issued, 1);
    assert_eq!(h.allocator.issuance_history(id).await.unwrap().len(), 100);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_database_rejects_overlap_and_duplicate_code() {
    let h = harness().await;
    create(&h, "AAA", 1, 100).await;

    let overlap = h
        .allocator
        .create_series(
            NewSeriesBuilder::new(h.dealer.id)
                .with_code("BBB")
                .with_range(50, 150)
                .build(),
            &MetadataFixtures::admin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(overlap, NumberingError::InvalidRange(_)));

    let duplicate = h
        .allocator
        .create_series(
            NewSeriesBuilder::new(h.dealer.id)
                .with_code("AAA")
                .with_range(200, 300)
                .build(),
            &MetadataFixtures::admin(),
        )
        .await
        .unwrap_err();
    assert!(matches!(duplicate, NumberingError::DuplicateSeries(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_reassignment_keeps_issuance_history() {
    let h = harness().await;
    let id = create(&h, "MTR", 1, 100).await;
    h.allocator.get_next_number(id).await.unwrap();

    let other = DealerFixtures::active();
    h.directory.upsert(&other).await.unwrap();
    h.allocator
        .assign_dealer(id, other.id, &MetadataFixtures::admin())
        .await
        .unwrap();
    h.allocator.get_next_number(id).await.unwrap();

    let history = h.allocator.issuance_history(id).await.unwrap();
    assert_eq!(history[0].dealer_id_at_issuance, h.dealer.id);
    assert_eq!(history[1].dealer_id_at_issuance, other.id);

    let resolved = h
        .allocator
        .resolve_policy_number(id, "MTR000001")
        .await
        .unwrap();
    assert_eq!(resolved.dealer_id_at_issuance, h.dealer.id);

    assert_event_types(
        &h.allocator.series_events(id).await.unwrap(),
        &["series_created", "number_issued", "dealer_reassigned", "number_issued"],
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_inactive_dealer_is_rejected() {
    let h = harness().await;
    let id = create(&h, "MTR", 1, 100).await;

    let other = DealerFixtures::active();
    h.directory.upsert(&other).await.unwrap();
    h.directory
        .set_status(other.id, DealerStatus::Suspended)
        .await
        .unwrap();

    let err = h
        .allocator
        .assign_dealer(id, other.id, &MetadataFixtures::admin())
        .await
        .unwrap_err();
    assert!(matches!(err, NumberingError::DealerInactive(_)));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_delete_and_extend() {
    let h = harness().await;
    let unused = create(&h, "NEW", 1, 10).await;
    let used = create(&h, "OLD", 11, 12).await;

    for _ in 0..2 {
        h.allocator.get_next_number(used).await.unwrap();
    }
    let extended = h
        .allocator
        .extend_range(used, 20, "renewal campaign", &MetadataFixtures::admin())
        .await
        .unwrap();
    assert_eq!(extended.end_number(), 20);
    assert_eq!(h.allocator.get_next_number(used).await.unwrap(), 13);

    let outcome = h
        .allocator
        .delete_series(unused, &MetadataFixtures::admin())
        .await
        .unwrap();
    assert_eq!(outcome, DeletionOutcome::Removed);
    assert!(h.allocator.get_series(unused).await.is_err());

    let outcome = h
        .allocator
        .delete_series(used, &MetadataFixtures::admin())
        .await
        .unwrap();
    assert_eq!(outcome, DeletionOutcome::Retired);
    assert!(h.allocator.get_series(used).await.unwrap().is_deleted());

    let live = h.allocator.list_series(&SeriesQuery::default()).await.unwrap();
    assert!(live.is_empty());
}

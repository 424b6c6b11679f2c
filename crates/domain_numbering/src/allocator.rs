//! Policy series allocator
//!
//! `PolicySeriesAllocator` is the domain service behind every numbering
//! operation. It orchestrates the series aggregate, the [`SeriesStore`] and
//! the [`DealerDirectory`].
//!
//! # Issuance protocol
//!
//! 1. Acquire the in-process lock of the series (bounded by `lock_timeout`)
//! 2. Read the series and remember its version
//! 3. Apply the mutation on the aggregate (depletion is checked here)
//! 4. Conditionally commit snapshot and event against the remembered version
//! 5. On a lost version race or a transient storage failure, back off and
//!    go to 2, at most `max_retries` times
//!
//! A commit that fails transiently may still have been applied. Before
//! issuing again the allocator re-reads the store, and if its earlier write
//! landed that result is returned instead, so no issued number goes
//! unreported.
//!
//! The lock serializes callers inside one process; the version check
//! serializes processes sharing a database. Different series never share a
//! lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use core_kernel::{DealerId, HealthCheckResult, OperationMetadata, PortError, SeriesId};

use crate::dealer::Dealer;
use crate::error::NumberingError;
use crate::events::{Issuance, RecordedEvent, SeriesEvent};
use crate::ports::{CommitOutcome, DealerDirectory, SeriesCommit, SeriesQuery, SeriesStore};
use crate::series::{NewSeries, PolicySeries, SeriesUpdate};
use crate::statistics::{DepletionThreshold, SeriesState, SeriesStatistics};

/// Backoff doubles per attempt up to this many doublings
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Tuning knobs of the allocator
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Commit attempts before `AllocationConflict` is surfaced
    pub max_retries: u32,
    /// Base delay between attempts, doubled each retry
    pub retry_backoff: Duration,
    /// Longest wait for the per-series lock
    pub lock_timeout: Duration,
    /// Upper bound for any single store call
    pub operation_timeout: Duration,
    /// Near-depletion warning boundary
    pub threshold: DepletionThreshold,
    /// Minimum digit width of formatted policy numbers
    pub min_number_width: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_backoff: Duration::from_millis(10),
            lock_timeout: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(5),
            threshold: DepletionThreshold::default(),
            min_number_width: 6,
        }
    }
}

impl AllocatorConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_threshold(mut self, threshold: DepletionThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_number_width(mut self, width: u32) -> Self {
        self.min_number_width = width;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
        self.retry_backoff.saturating_mul(1 << doublings)
    }
}

/// A freshly issued policy number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedPolicyNumber {
    pub series_id: SeriesId,
    pub series: String,
    pub issued_number: i64,
    pub policy_number: String,
}

/// How a series was deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// Nothing had been issued; the series is gone
    Removed,
    /// Numbers had been issued; the series is retained but retired
    Retired,
}

/// What a single attempt wants persisted
enum Mutation<T> {
    Unchanged(T),
    Commit(T, SeriesEvent),
    Remove(T, SeriesEvent),
}

/// A write whose acknowledgement was lost
enum PendingWrite {
    Snapshot(PolicySeries),
    Issued(Issuance),
    Removal,
}

/// Result of one read-apply-commit round
enum Attempt<T> {
    Done(T),
    Conflict,
    Unacknowledged(T, PendingWrite, PortError),
}

/// Per-series async locks
#[derive(Debug, Default)]
struct SeriesLocks {
    locks: Mutex<HashMap<SeriesId, Arc<Mutex<()>>>>,
}

impl SeriesLocks {
    async fn acquire(
        &self,
        id: SeriesId,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, NumberingError> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id).or_default().clone()
        };

        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                warn!(series_id = %id, timeout_ms = timeout.as_millis() as u64, "Series lock wait timed out");
                NumberingError::AllocationConflict {
                    series_id: id,
                    attempts: 0,
                }
            })
    }

    /// Drops the entry of a series unless another caller still holds it
    async fn forget(&self, id: SeriesId) {
        let mut locks = self.locks.lock().await;
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }
}

/// Domain service for series administration and number issuance
pub struct PolicySeriesAllocator {
    store: Arc<dyn SeriesStore>,
    dealers: Arc<dyn DealerDirectory>,
    config: AllocatorConfig,
    locks: SeriesLocks,
}

impl PolicySeriesAllocator {
    /// Creates an allocator over the given adapters
    pub fn new(
        store: Arc<dyn SeriesStore>,
        dealers: Arc<dyn DealerDirectory>,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            store,
            dealers,
            config,
            locks: SeriesLocks::default(),
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Issuance
    // ------------------------------------------------------------------

    /// Issues the next number of a series
    ///
    /// # Returns
    ///
    /// The issued integer. Concurrent callers on the same series always
    /// receive distinct, consecutive numbers.
    ///
    /// # Errors
    ///
    /// * `SeriesNotFound` - the series does not exist or is deleted
    /// * `SeriesDepleted` - no numbers remain; nothing is written
    /// * `AllocationConflict` - the retry budget ran out; safe to retry
    #[instrument(skip(self), fields(series_id = %series_id))]
    pub async fn get_next_number(&self, series_id: SeriesId) -> Result<i64, NumberingError> {
        Ok(self.issue(series_id).await?.issued_number)
    }

    /// Issues the next number and formats it as a policy number
    #[instrument(skip(self), fields(series_id = %series_id))]
    pub async fn generate_full_policy_number(
        &self,
        series_id: SeriesId,
    ) -> Result<IssuedPolicyNumber, NumberingError> {
        self.issue(series_id).await
    }

    /// Claims a number and formats it from the snapshot that was committed
    async fn issue(&self, series_id: SeriesId) -> Result<IssuedPolicyNumber, NumberingError> {
        let threshold = self.config.threshold;

        let (issued, before, after) = self
            .mutate(series_id, |series, now| {
                let before = series.state(&threshold);
                let number = series.issue_next(now)?;
                let after = series.state(&threshold);
                let issued = IssuedPolicyNumber {
                    series_id: series.id(),
                    series: series.series().to_string(),
                    issued_number: number,
                    policy_number: series.format_number(number)?.to_string(),
                };
                let event = SeriesEvent::NumberIssued(Issuance {
                    series_id: series.id(),
                    issued_number: number,
                    dealer_id_at_issuance: series.dealer_id(),
                    issued_at: now,
                });
                Ok(Mutation::Commit((issued, before, after), event))
            })
            .await?;

        debug!(series = %issued.series, issued = issued.issued_number, "Issued number");
        if after > before {
            match after {
                SeriesState::Depleted => warn!(series = %issued.series, "Series is now depleted"),
                _ => warn!(series = %issued.series, "Series is near depletion"),
            }
        }

        Ok(issued)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Moves a series to another dealer
    ///
    /// Assigning the current dealer succeeds without writing anything.
    #[instrument(skip(self, metadata), fields(series_id = %series_id, dealer_id = %dealer_id))]
    pub async fn assign_dealer(
        &self,
        series_id: SeriesId,
        dealer_id: DealerId,
        metadata: &OperationMetadata,
    ) -> Result<PolicySeries, NumberingError> {
        let current = self.load_live(series_id).await?;
        if current.dealer_id() == dealer_id {
            debug!("Dealer already owns series");
            return Ok(current);
        }

        self.require_active_dealer(dealer_id).await?;

        let actor = metadata.actor().to_string();
        let series = self
            .mutate(series_id, |series, now| {
                let Some(previous) = series.reassign_dealer(dealer_id, now)? else {
                    return Ok(Mutation::Unchanged(series.clone()));
                };
                let event = SeriesEvent::DealerReassigned {
                    series_id: series.id(),
                    from: previous,
                    to: dealer_id,
                    initiated_by: actor.clone(),
                    timestamp: now,
                };
                Ok(Mutation::Commit(series.clone(), event))
            })
            .await?;

        info!(series = %series.series(), actor = %metadata.actor(), "Dealer reassigned");
        Ok(series)
    }

    /// Creates a new series
    ///
    /// # Errors
    ///
    /// * `DealerNotFound` / `DealerInactive` - the dealer cannot own series
    /// * `DuplicateSeries` - the code is taken
    /// * `InvalidRange` - bounds are invalid or overlap another series
    #[instrument(skip(self, new, metadata), fields(series = %new.series))]
    pub async fn create_series(
        &self,
        new: NewSeries,
        metadata: &OperationMetadata,
    ) -> Result<PolicySeries, NumberingError> {
        let series = PolicySeries::create(new, self.config.min_number_width)?;
        self.require_active_dealer(series.dealer_id()).await?;

        if self
            .bounded("find_by_code", self.store.find_by_code(series.series()))
            .await?
            .is_some()
        {
            return Err(NumberingError::DuplicateSeries(series.series().to_string()));
        }

        let overlapping = self
            .bounded(
                "find_overlapping",
                self.store
                    .find_overlapping(series.start_number(), series.end_number(), None),
            )
            .await?;
        if let Some(other) = overlapping.first() {
            return Err(overlap_error(&series, other));
        }

        let event = SeriesEvent::SeriesCreated {
            series_id: series.id(),
            series: series.series().to_string(),
            dealer_id: series.dealer_id(),
            start_number: series.start_number(),
            end_number: series.end_number(),
            initiated_by: metadata.actor().to_string(),
            timestamp: series.created_at(),
        };

        match self.bounded("insert", self.store.insert(&series, &event)).await? {
            CommitOutcome::Committed => {}
            CommitOutcome::DuplicateCode => {
                return Err(NumberingError::DuplicateSeries(series.series().to_string()))
            }
            CommitOutcome::RangeOverlap => return Err(range_taken(&series)),
            CommitOutcome::VersionConflict => {
                return Err(PortError::conflict(format!("series {} already stored", series.id())).into())
            }
        }

        info!(
            series_id = %series.id(),
            start = series.start_number(),
            end = series.end_number(),
            actor = %metadata.actor(),
            "Series created"
        );
        Ok(series)
    }

    /// Retrieves a series; soft-deleted series are still readable
    pub async fn get_series(&self, series_id: SeriesId) -> Result<PolicySeries, NumberingError> {
        self.bounded("get", self.store.get(series_id))
            .await?
            .ok_or(NumberingError::SeriesNotFound(series_id))
    }

    /// Lists series matching the query
    pub async fn list_series(
        &self,
        query: &SeriesQuery,
    ) -> Result<Vec<PolicySeries>, NumberingError> {
        self.bounded("list", self.store.list(query)).await
    }

    /// Edits code, range or description of a series
    ///
    /// Code and range can only change while nothing has been issued.
    #[instrument(skip(self, update, metadata), fields(series_id = %series_id))]
    pub async fn update_series(
        &self,
        series_id: SeriesId,
        update: SeriesUpdate,
        metadata: &OperationMetadata,
    ) -> Result<PolicySeries, NumberingError> {
        if update.is_empty() {
            return self.load_live(series_id).await;
        }

        let min_width = self.config.min_number_width;
        let actor = metadata.actor().to_string();
        let series = self
            .mutate(series_id, |series, now| {
                if !series.apply_update(&update, min_width, now)? {
                    return Ok(Mutation::Unchanged(series.clone()));
                }
                let event = SeriesEvent::SeriesUpdated {
                    series_id: series.id(),
                    series: series.series().to_string(),
                    start_number: series.start_number(),
                    end_number: series.end_number(),
                    initiated_by: actor.clone(),
                    timestamp: now,
                };
                Ok(Mutation::Commit(series.clone(), event))
            })
            .await?;

        info!(series = %series.series(), actor = %metadata.actor(), "Series updated");
        Ok(series)
    }

    /// Deletes a series
    ///
    /// A series from which nothing was issued is removed outright. Otherwise
    /// it is retired: kept for resolution of its issued numbers but closed
    /// to every mutation.
    #[instrument(skip(self, metadata), fields(series_id = %series_id))]
    pub async fn delete_series(
        &self,
        series_id: SeriesId,
        metadata: &OperationMetadata,
    ) -> Result<DeletionOutcome, NumberingError> {
        let actor = metadata.actor().to_string();
        let outcome = self
            .mutate(series_id, |series, now| {
                if series.has_issued() {
                    series.mark_deleted(now)?;
                    let event = SeriesEvent::SeriesDeleted {
                        series_id: series.id(),
                        soft: true,
                        initiated_by: actor.clone(),
                        timestamp: now,
                    };
                    Ok(Mutation::Commit(DeletionOutcome::Retired, event))
                } else {
                    let event = SeriesEvent::SeriesDeleted {
                        series_id: series.id(),
                        soft: false,
                        initiated_by: actor.clone(),
                        timestamp: now,
                    };
                    Ok(Mutation::Remove(DeletionOutcome::Removed, event))
                }
            })
            .await?;

        self.locks.forget(series_id).await;
        info!(?outcome, actor = %metadata.actor(), "Series deleted");
        Ok(outcome)
    }

    /// Raises the end number of a series
    ///
    /// The only way to bring a depleted series back into service.
    #[instrument(skip(self, reason, metadata), fields(series_id = %series_id))]
    pub async fn extend_range(
        &self,
        series_id: SeriesId,
        new_end: i64,
        reason: &str,
        metadata: &OperationMetadata,
    ) -> Result<PolicySeries, NumberingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(NumberingError::validation("a reason is required to extend a range"));
        }

        let actor = metadata.actor().to_string();
        let series = self
            .mutate(series_id, |series, now| {
                let previous_end = series.extend_range(new_end, now)?;
                let event = SeriesEvent::RangeExtended {
                    series_id: series.id(),
                    previous_end,
                    new_end,
                    reason: reason.to_string(),
                    initiated_by: actor.clone(),
                    timestamp: now,
                };
                Ok(Mutation::Commit(series.clone(), event))
            })
            .await?;

        info!(
            series = %series.series(),
            new_end,
            actor = %metadata.actor(),
            "Series range extended"
        );
        Ok(series)
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Usage statistics of a series
    pub async fn get_series_statistics(
        &self,
        series_id: SeriesId,
    ) -> Result<SeriesStatistics, NumberingError> {
        let series = self.get_series(series_id).await?;
        Ok(series.statistics(&self.config.threshold))
    }

    /// Statistics of every live series that is near depletion or depleted,
    /// most urgent first
    pub async fn list_near_depletion(&self) -> Result<Vec<SeriesStatistics>, NumberingError> {
        let series = self.list_series(&SeriesQuery::default()).await?;
        let mut flagged: Vec<_> = series
            .iter()
            .map(|s| s.statistics(&self.config.threshold))
            .filter(|stats| stats.is_near_depletion)
            .collect();
        flagged.sort_by(|a, b| a.remaining.cmp(&b.remaining).then_with(|| a.series.cmp(&b.series)));
        Ok(flagged)
    }

    /// Issuance log of a series
    pub async fn issuance_history(
        &self,
        series_id: SeriesId,
    ) -> Result<Vec<Issuance>, NumberingError> {
        self.get_series(series_id).await?;
        self.bounded("issuances", self.store.issuances(series_id)).await
    }

    /// Full audit trail of a series
    ///
    /// Hard-deleted series keep their trail, so this does not require the
    /// series to exist.
    pub async fn series_events(
        &self,
        series_id: SeriesId,
    ) -> Result<Vec<RecordedEvent>, NumberingError> {
        let events = self.bounded("events", self.store.events(series_id)).await?;
        if events.is_empty() {
            return Err(NumberingError::SeriesNotFound(series_id));
        }
        Ok(events)
    }

    /// Resolves a formatted policy number to its issuance record
    pub async fn resolve_policy_number(
        &self,
        series_id: SeriesId,
        policy_number: &str,
    ) -> Result<Issuance, NumberingError> {
        let series = self.get_series(series_id).await?;
        let parsed = series.parse_number(policy_number)?;

        self.bounded(
            "find_issuance",
            self.store.find_issuance(series_id, parsed.number()),
        )
        .await?
        .ok_or_else(|| {
            NumberingError::validation(format!("{} has no issuance record", parsed))
        })
    }

    /// Health of the underlying adapters
    pub async fn health(&self) -> Vec<HealthCheckResult> {
        vec![
            self.store.health_check().await,
            self.dealers.health_check().await,
        ]
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn load_live(&self, series_id: SeriesId) -> Result<PolicySeries, NumberingError> {
        let series = self.get_series(series_id).await?;
        if series.is_deleted() {
            return Err(NumberingError::SeriesNotFound(series_id));
        }
        Ok(series)
    }

    async fn require_active_dealer(&self, dealer_id: DealerId) -> Result<Dealer, NumberingError> {
        let dealer = self
            .bounded("get_dealer", self.dealers.get_dealer(dealer_id))
            .await?
            .ok_or(NumberingError::DealerNotFound(dealer_id))?;
        if !dealer.can_own_series() {
            return Err(NumberingError::DealerInactive(dealer_id));
        }
        Ok(dealer)
    }

    /// Runs a store call under the operation timeout
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, NumberingError>
    where
        F: Future<Output = Result<T, PortError>>,
    {
        let timeout = self.config.operation_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(NumberingError::from),
            Err(_) => Err(PortError::timeout(operation, timeout.as_millis() as u64).into()),
        }
    }

    /// Serialized, optimistically committed mutation of one series
    async fn mutate<T, F>(&self, series_id: SeriesId, apply: F) -> Result<T, NumberingError>
    where
        F: FnMut(&mut PolicySeries, DateTime<Utc>) -> Result<Mutation<T>, NumberingError> + Send,
        T: Send,
    {
        let result = {
            let _guard = self
                .locks
                .acquire(series_id, self.config.lock_timeout)
                .await?;
            self.mutate_locked(series_id, apply).await
        };

        if matches!(result, Err(NumberingError::SeriesNotFound(_))) {
            self.locks.forget(series_id).await;
        }
        result
    }

    async fn mutate_locked<T, F>(&self, series_id: SeriesId, mut apply: F) -> Result<T, NumberingError>
    where
        F: FnMut(&mut PolicySeries, DateTime<Utc>) -> Result<Mutation<T>, NumberingError> + Send,
        T: Send,
    {
        let attempts = self.config.attempts();
        let mut unacknowledged: Vec<(T, PendingWrite)> = Vec::new();

        for attempt in 1..=attempts {
            match self.reconcile(series_id, &mut unacknowledged).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(NumberingError::Storage(error)) if error.is_transient() => {
                    warn!(attempt, error = %error, "Could not verify unacknowledged write, retrying");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.backoff_for(attempt)).await;
                    }
                    continue;
                }
                Err(error) => return Err(error),
            }

            match self.attempt(series_id, &mut apply).await {
                Ok(Attempt::Done(value)) => return Ok(value),
                Ok(Attempt::Conflict) => {
                    debug!(attempt, "Version conflict, retrying");
                }
                Ok(Attempt::Unacknowledged(value, pending, error)) => {
                    warn!(attempt, error = %error, "Commit outcome unknown, verifying before retry");
                    unacknowledged.push((value, pending));
                }
                Err(NumberingError::Storage(error)) if error.is_transient() => {
                    warn!(attempt, error = %error, "Transient storage failure, retrying");
                }
                Err(error) => return Err(error),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.backoff_for(attempt)).await;
            }
        }

        // One last look so a write that did land is never reported as a failure
        if let Ok(Some(value)) = self.reconcile(series_id, &mut unacknowledged).await {
            return Ok(value);
        }

        warn!(attempts, "Retry budget exhausted");
        Err(NumberingError::AllocationConflict {
            series_id,
            attempts,
        })
    }

    /// One read-apply-commit round
    async fn attempt<T, F>(
        &self,
        series_id: SeriesId,
        apply: &mut F,
    ) -> Result<Attempt<T>, NumberingError>
    where
        F: FnMut(&mut PolicySeries, DateTime<Utc>) -> Result<Mutation<T>, NumberingError> + Send,
        T: Send,
    {
        let mut series = self.load_live(series_id).await?;
        let expected_version = series.version();

        let (value, pending, result) = match apply(&mut series, Utc::now())? {
            Mutation::Unchanged(value) => return Ok(Attempt::Done(value)),
            Mutation::Commit(value, event) => {
                let pending = match event.as_issuance() {
                    Some(issuance) => PendingWrite::Issued(issuance.clone()),
                    None => PendingWrite::Snapshot(series.clone()),
                };
                let commit = SeriesCommit::new(series.clone(), expected_version, event);
                let result = self.bounded("commit", self.store.commit(&commit)).await;
                (value, pending, result)
            }
            Mutation::Remove(value, event) => {
                let result = self
                    .bounded(
                        "remove",
                        self.store.remove(series_id, expected_version, &event),
                    )
                    .await;
                (value, PendingWrite::Removal, result)
            }
        };

        match result {
            Ok(CommitOutcome::Committed) => Ok(Attempt::Done(value)),
            Ok(CommitOutcome::VersionConflict) => Ok(Attempt::Conflict),
            Ok(CommitOutcome::DuplicateCode) => {
                Err(NumberingError::DuplicateSeries(series.series().to_string()))
            }
            Ok(CommitOutcome::RangeOverlap) => Err(range_taken(&series)),
            Err(NumberingError::Storage(error)) if error.is_transient() => {
                Ok(Attempt::Unacknowledged(value, pending, error))
            }
            Err(error) => Err(error),
        }
    }

    /// Checks whether any write with a lost acknowledgement was applied
    ///
    /// Returns the value of the applied write, if one was. Writes that
    /// provably did not land stay in the list: a timed-out commit can still
    /// be applied later, and its conflict with a fresh attempt is what sends
    /// the loop back here.
    async fn reconcile<T>(
        &self,
        series_id: SeriesId,
        unacknowledged: &mut Vec<(T, PendingWrite)>,
    ) -> Result<Option<T>, NumberingError> {
        if unacknowledged.is_empty() {
            return Ok(None);
        }

        let stored = self.bounded("get", self.store.get(series_id)).await?;
        for index in 0..unacknowledged.len() {
            let landed = match &unacknowledged[index].1 {
                PendingWrite::Removal => stored.is_none(),
                PendingWrite::Snapshot(written) => stored
                    .as_ref()
                    .is_some_and(|stored| written.same_snapshot(stored)),
                PendingWrite::Issued(issuance) => self
                    .bounded(
                        "find_issuance",
                        self.store.find_issuance(series_id, issuance.issued_number),
                    )
                    .await?
                    .is_some_and(|recorded| issuance.same_issuance(&recorded)),
            };
            if landed {
                info!("Unacknowledged write was applied");
                let (value, _) = unacknowledged.swap_remove(index);
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

fn overlap_error(series: &PolicySeries, other: &PolicySeries) -> NumberingError {
    NumberingError::invalid_range(format!(
        "range {}..={} overlaps series {} ({}..={})",
        series.start_number(),
        series.end_number(),
        other.series(),
        other.start_number(),
        other.end_number()
    ))
}

fn range_taken(series: &PolicySeries) -> NumberingError {
    NumberingError::invalid_range(format!(
        "range {}..={} overlaps another series",
        series.start_number(),
        series.end_number()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = AllocatorConfig::default().with_retry_backoff(Duration::from_millis(10));
        assert_eq!(config.backoff_for(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for(2), Duration::from_millis(20));
        assert_eq!(config.backoff_for(3), Duration::from_millis(40));
        assert_eq!(config.backoff_for(50), Duration::from_millis(640));
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let config = AllocatorConfig::default().with_max_retries(0);
        assert_eq!(config.attempts(), 1);
    }

    async fn allocator_with_series() -> (PolicySeriesAllocator, SeriesId) {
        use crate::memory::{InMemoryDealerDirectory, InMemorySeriesStore};

        let dealer = Dealer::new("Harbour Motors");
        let dealers = InMemoryDealerDirectory::with_dealers(vec![dealer.clone()]).await;
        let allocator = PolicySeriesAllocator::new(
            Arc::new(InMemorySeriesStore::new()),
            Arc::new(dealers),
            AllocatorConfig::default(),
        );
        let series = allocator
            .create_series(
                NewSeries {
                    series: "MTR".to_string(),
                    dealer_id: dealer.id,
                    description: None,
                    start_number: 1,
                    end_number: 100,
                },
                &OperationMetadata::default(),
            )
            .await
            .unwrap();
        (allocator, series.id())
    }

    #[tokio::test]
    async fn test_unknown_series_leave_no_lock_behind() {
        let (allocator, _) = allocator_with_series().await;

        for _ in 0..100 {
            let err = allocator.get_next_number(SeriesId::new()).await.unwrap_err();
            assert!(matches!(err, NumberingError::SeriesNotFound(_)));
        }

        assert!(allocator.locks.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_series_release_their_lock() {
        let (allocator, id) = allocator_with_series().await;
        let metadata = OperationMetadata::default();

        allocator.get_next_number(id).await.unwrap();
        assert_eq!(allocator.locks.locks.lock().await.len(), 1);

        allocator.delete_series(id, &metadata).await.unwrap();
        assert!(allocator.locks.locks.lock().await.is_empty());

        allocator.get_next_number(id).await.unwrap_err();
        assert!(allocator.locks.locks.lock().await.is_empty());
    }
}

//! Policy Series Aggregate
//!
//! A policy series is a named, bounded range of policy numbers assigned to
//! one dealer at a time. It is the consistency boundary for issuance.
//!
//! # Invariants
//!
//! - `start_number <= current_number <= end_number + 1`
//! - `current_number` is the next number to issue and never decreases
//! - a series is depleted exactly when `current_number > end_number`
//! - the range and series code are frozen once a number has been issued
//! - `end_number` only grows, through [`PolicySeries::extend_range`]
//! - dealer reassignment never touches the numeric state
//!
//! Every persisted mutation bumps `version`, which stores use as the
//! optimistic concurrency token.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CoreError, DealerId, SeriesId};

use crate::error::NumberingError;
use crate::policy_number::{max_for_width, width_for, PolicyNumber, MAX_NUMBER_WIDTH};
use crate::statistics::{DepletionThreshold, SeriesState, SeriesStatistics};

const MAX_CODE_LEN: usize = 20;

/// Human-readable series code, unique across the system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesCode(String);

impl SeriesCode {
    /// Normalizes and validates a series code
    ///
    /// Codes are upper-cased and may contain `A-Z`, `0-9`, `-` and `/`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let code = raw.trim().to_ascii_uppercase();

        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(CoreError::validation(format!(
                "series code must be 1-{} characters",
                MAX_CODE_LEN
            )));
        }
        if let Some(bad) = code
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '/'))
        {
            return Err(CoreError::validation(format!(
                "series code contains invalid character '{}'",
                bad
            )));
        }

        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to create a series
#[derive(Debug, Clone)]
pub struct NewSeries {
    pub series: String,
    pub dealer_id: DealerId,
    pub description: Option<String>,
    pub start_number: i64,
    pub end_number: i64,
}

/// Administrative metadata edit
///
/// `series`, `start_number` and `end_number` may only change while nothing
/// has been issued.
#[derive(Debug, Clone, Default)]
pub struct SeriesUpdate {
    pub series: Option<String>,
    pub start_number: Option<i64>,
    pub end_number: Option<i64>,
    /// `Some("")` clears the description
    pub description: Option<String>,
}

impl SeriesUpdate {
    pub fn is_empty(&self) -> bool {
        self.series.is_none()
            && self.start_number.is_none()
            && self.end_number.is_none()
            && self.description.is_none()
    }
}

/// Flat persistence form of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub id: SeriesId,
    pub series: String,
    pub dealer_id: DealerId,
    pub description: Option<String>,
    pub start_number: i64,
    pub end_number: i64,
    pub current_number: i64,
    pub number_width: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// The policy series aggregate root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySeries {
    id: SeriesId,
    series: SeriesCode,
    dealer_id: DealerId,
    description: Option<String>,
    start_number: i64,
    end_number: i64,
    current_number: i64,
    number_width: u32,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl PolicySeries {
    /// Creates a new series with nothing issued
    ///
    /// # Arguments
    ///
    /// * `new` - Code, dealer and range of the series
    /// * `min_width` - Minimum digit width of formatted numbers
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for negative or inverted bounds and
    /// `Validation` for a malformed code.
    pub fn create(new: NewSeries, min_width: u32) -> Result<Self, NumberingError> {
        let series = SeriesCode::parse(&new.series)?;
        validate_range(new.start_number, new.end_number)?;

        let number_width = width_for(new.end_number, min_width);
        if new.end_number > max_for_width(MAX_NUMBER_WIDTH) {
            return Err(NumberingError::invalid_range(format!(
                "end number {} exceeds {} digits",
                new.end_number, MAX_NUMBER_WIDTH
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: SeriesId::new_v7(),
            series,
            dealer_id: new.dealer_id,
            description: normalize_description(new.description),
            start_number: new.start_number,
            end_number: new.end_number,
            current_number: new.start_number,
            number_width,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Restores a series from storage, checking the range invariants
    pub fn rehydrate(record: SeriesRecord) -> Result<Self, NumberingError> {
        let corrupt = |reason: String| NumberingError::CorruptSeries {
            series_id: record.id,
            reason,
        };

        let series = SeriesCode::parse(&record.series).map_err(|e| corrupt(e.to_string()))?;
        if record.start_number < 0 || record.start_number > record.end_number {
            return Err(corrupt(format!(
                "range {}..={} is inverted",
                record.start_number, record.end_number
            )));
        }
        if record.current_number < record.start_number
            || record.current_number > record.end_number + 1
        {
            return Err(corrupt(format!(
                "current number {} outside {}..={}",
                record.current_number,
                record.start_number,
                record.end_number + 1
            )));
        }
        if record.number_width == 0
            || record.number_width > MAX_NUMBER_WIDTH
            || record.end_number > max_for_width(record.number_width)
        {
            return Err(corrupt(format!("width {} cannot hold end number", record.number_width)));
        }

        Ok(Self {
            id: record.id,
            series,
            dealer_id: record.dealer_id,
            description: record.description,
            start_number: record.start_number,
            end_number: record.end_number,
            current_number: record.current_number,
            number_width: record.number_width,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deleted_at: record.deleted_at,
        })
    }

    /// Returns the flat persistence form
    pub fn to_record(&self) -> SeriesRecord {
        SeriesRecord {
            id: self.id,
            series: self.series.to_string(),
            dealer_id: self.dealer_id,
            description: self.description.clone(),
            start_number: self.start_number,
            end_number: self.end_number,
            current_number: self.current_number,
            number_width: self.number_width,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> SeriesId {
        self.id
    }

    pub fn series(&self) -> &str {
        self.series.as_str()
    }

    pub fn dealer_id(&self) -> DealerId {
        self.dealer_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn start_number(&self) -> i64 {
        self.start_number
    }

    pub fn end_number(&self) -> i64 {
        self.end_number
    }

    pub fn current_number(&self) -> i64 {
        self.current_number
    }

    pub fn number_width(&self) -> u32 {
        self.number_width
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_depleted(&self) -> bool {
        self.current_number > self.end_number
    }

    /// True once any number has been issued
    pub fn has_issued(&self) -> bool {
        self.current_number > self.start_number
    }

    /// Numbers still available for issuance
    pub fn remaining(&self) -> i64 {
        (self.end_number - self.current_number + 1).max(0)
    }

    /// True if `number` has already been issued from this series
    pub fn was_issued(&self, number: i64) -> bool {
        number >= self.start_number && number < self.current_number
    }

    /// True if the inclusive range `start..=end` shares any number with this series
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        start <= self.end_number && self.start_number <= end
    }

    pub fn statistics(&self, threshold: &DepletionThreshold) -> SeriesStatistics {
        SeriesStatistics::compute(self, threshold)
    }

    pub fn state(&self, threshold: &DepletionThreshold) -> SeriesState {
        self.statistics(threshold).state
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Claims the next number, advancing the current pointer
    ///
    /// # Errors
    ///
    /// `SeriesNotFound` if the series is deleted, `SeriesDepleted` if no
    /// numbers remain. Neither error mutates the series.
    pub fn issue_next(&mut self, now: DateTime<Utc>) -> Result<i64, NumberingError> {
        self.ensure_live()?;
        if self.is_depleted() {
            return Err(NumberingError::SeriesDepleted {
                series: self.series.to_string(),
                end_number: self.end_number,
            });
        }

        let issued = self.current_number;
        self.current_number = issued + 1;
        self.touch(now);
        Ok(issued)
    }

    /// Reassigns the series, returning the previous dealer if it changed
    pub fn reassign_dealer(
        &mut self,
        dealer_id: DealerId,
        now: DateTime<Utc>,
    ) -> Result<Option<DealerId>, NumberingError> {
        self.ensure_live()?;
        if self.dealer_id == dealer_id {
            return Ok(None);
        }
        let previous = self.dealer_id;
        self.dealer_id = dealer_id;
        self.touch(now);
        Ok(Some(previous))
    }

    /// Applies an administrative edit, returning whether anything changed
    ///
    /// # Errors
    ///
    /// `InvalidRange` when the range changes after issuance or becomes
    /// invalid, `Validation` when the code changes after issuance.
    pub fn apply_update(
        &mut self,
        update: &SeriesUpdate,
        min_width: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, NumberingError> {
        self.ensure_live()?;

        let code = match &update.series {
            Some(raw) => Some(SeriesCode::parse(raw)?),
            None => None,
        };
        let code_changes = code.as_ref().is_some_and(|c| *c != self.series);
        let start = update.start_number.unwrap_or(self.start_number);
        let end = update.end_number.unwrap_or(self.end_number);
        let range_changes = start != self.start_number || end != self.end_number;

        if range_changes {
            if self.has_issued() {
                return Err(NumberingError::invalid_range(format!(
                    "range of series {} is fixed once numbers are issued",
                    self.series
                )));
            }
            validate_range(start, end)?;
        }
        if code_changes && self.has_issued() {
            return Err(NumberingError::validation(format!(
                "series code {} cannot change once numbers are issued",
                self.series
            )));
        }

        let description = update
            .description
            .clone()
            .map(|d| normalize_description(Some(d)));
        let description_changes = description.as_ref().is_some_and(|d| *d != self.description);

        if !(range_changes || code_changes || description_changes) {
            return Ok(false);
        }

        if range_changes {
            self.start_number = start;
            self.end_number = end;
            self.current_number = start;
            self.number_width = width_for(end, min_width.max(self.number_width));
        }
        if let Some(code) = code.filter(|_| code_changes) {
            self.series = code;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.touch(now);
        Ok(true)
    }

    /// Raises `end_number`, the only operation that can reverse depletion
    ///
    /// Returns the previous end number.
    pub fn extend_range(&mut self, new_end: i64, now: DateTime<Utc>) -> Result<i64, NumberingError> {
        self.ensure_live()?;
        if new_end <= self.end_number {
            return Err(NumberingError::invalid_range(format!(
                "new end number {} must exceed current end {}",
                new_end, self.end_number
            )));
        }
        if new_end > max_for_width(self.number_width) {
            return Err(NumberingError::invalid_range(format!(
                "new end number {} does not fit the series width of {} digits",
                new_end, self.number_width
            )));
        }

        let previous = self.end_number;
        self.end_number = new_end;
        self.touch(now);
        Ok(previous)
    }

    /// Logically deletes the series; issued numbers stay resolvable
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Result<(), NumberingError> {
        self.ensure_live()?;
        self.deleted_at = Some(now);
        self.touch(now);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Policy numbers
    // ------------------------------------------------------------------

    /// Returns true if `stored` is this snapshot as persisted
    ///
    /// Timestamps are compared at microsecond precision, the resolution
    /// PostgreSQL keeps.
    pub fn same_snapshot(&self, stored: &PolicySeries) -> bool {
        self.id == stored.id
            && self.version == stored.version
            && self.series == stored.series
            && self.dealer_id == stored.dealer_id
            && self.start_number == stored.start_number
            && self.end_number == stored.end_number
            && self.current_number == stored.current_number
            && self.deleted_at.is_some() == stored.deleted_at.is_some()
            && self.updated_at.timestamp_micros() == stored.updated_at.timestamp_micros()
    }

    /// Formats an integer from this series as a canonical policy number
    pub fn format_number(&self, number: i64) -> Result<PolicyNumber, NumberingError> {
        if number < self.start_number || number > self.end_number {
            return Err(NumberingError::validation(format!(
                "{} is outside series {} range {}..={}",
                number, self.series, self.start_number, self.end_number
            )));
        }
        PolicyNumber::new(self.series.as_str(), number, self.number_width)
    }

    /// Parses a policy number issued from this series
    pub fn parse_number(&self, formatted: &str) -> Result<PolicyNumber, NumberingError> {
        let parsed = PolicyNumber::parse(formatted.trim(), self.series.as_str(), self.number_width)?;
        if !self.was_issued(parsed.number()) {
            return Err(NumberingError::validation(format!(
                "{} has not been issued from series {}",
                formatted, self.series
            )));
        }
        Ok(parsed)
    }

    fn ensure_live(&self) -> Result<(), NumberingError> {
        if self.is_deleted() {
            return Err(NumberingError::SeriesNotFound(self.id));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Checks inclusive range bounds
pub fn validate_range(start: i64, end: i64) -> Result<(), NumberingError> {
    if start < 0 {
        return Err(NumberingError::invalid_range(format!(
            "start number {} cannot be negative",
            start
        )));
    }
    if start > end {
        return Err(NumberingError::invalid_range(format!(
            "start number {} is greater than end number {}",
            start, end
        )));
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_series(start: i64, end: i64) -> PolicySeries {
        PolicySeries::create(
            NewSeries {
                series: "mtr-24".to_string(),
                dealer_id: DealerId::new(),
                description: None,
                start_number: start,
                end_number: end,
            },
            6,
        )
        .unwrap()
    }

    #[test]
    fn test_code_is_normalized() {
        let series = new_series(1, 10);
        assert_eq!(series.series(), "MTR-24");
    }

    #[test]
    fn test_code_rejects_spaces() {
        assert!(SeriesCode::parse("MTR 24").is_err());
        assert!(SeriesCode::parse("").is_err());
        assert!(SeriesCode::parse(&"A".repeat(21)).is_err());
    }

    #[test]
    fn test_issue_advances_and_bumps_version() {
        let mut series = new_series(1000, 1004);
        let version = series.version();
        assert_eq!(series.issue_next(Utc::now()).unwrap(), 1000);
        assert_eq!(series.current_number(), 1001);
        assert_eq!(series.version(), version + 1);
        assert_eq!(series.remaining(), 4);
    }

    #[test]
    fn test_depleted_issue_does_not_mutate() {
        let mut series = new_series(1, 1);
        series.issue_next(Utc::now()).unwrap();
        let before = series.clone();
        let err = series.issue_next(Utc::now()).unwrap_err();
        assert!(matches!(err, NumberingError::SeriesDepleted { .. }));
        assert_eq!(series, before);
    }

    #[test]
    fn test_rehydrate_rejects_broken_pointer() {
        let mut record = new_series(10, 20).to_record();
        record.current_number = 22;
        assert!(matches!(
            PolicySeries::rehydrate(record),
            Err(NumberingError::CorruptSeries { .. })
        ));
    }

    #[test]
    fn test_update_before_issuance_resets_pointer() {
        let mut series = new_series(10, 20);
        let changed = series
            .apply_update(
                &SeriesUpdate {
                    start_number: Some(100),
                    end_number: Some(200),
                    ..Default::default()
                },
                6,
                Utc::now(),
            )
            .unwrap();
        assert!(changed);
        assert_eq!(series.current_number(), 100);
    }

    #[test]
    fn test_noop_update_keeps_version() {
        let mut series = new_series(10, 20);
        let version = series.version();
        let changed = series
            .apply_update(
                &SeriesUpdate {
                    series: Some("MTR-24".to_string()),
                    ..Default::default()
                },
                6,
                Utc::now(),
            )
            .unwrap();
        assert!(!changed);
        assert_eq!(series.version(), version);
    }

    #[test]
    fn test_overlaps_is_inclusive() {
        let series = new_series(100, 200);
        assert!(series.overlaps(200, 300));
        assert!(series.overlaps(0, 100));
        assert!(!series.overlaps(201, 300));
    }

    #[test]
    fn test_same_snapshot_ignores_sub_microsecond_precision() {
        let mut series = new_series(1, 10);
        series.issue_next(Utc::now()).unwrap();

        let mut record = series.to_record();
        record.updated_at = DateTime::from_timestamp_micros(record.updated_at.timestamp_micros())
            .unwrap();
        let stored = PolicySeries::rehydrate(record).unwrap();
        assert!(series.same_snapshot(&stored));

        let mut later = stored.clone();
        later.issue_next(Utc::now()).unwrap();
        assert!(!series.same_snapshot(&later));
    }
}

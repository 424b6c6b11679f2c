//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for numbering types that give
//! more meaningful error messages than standard assertions.

use domain_numbering::{RecordedEvent, SeriesStatistics};

/// Asserts that `numbers`, once sorted, are exactly `start, start + 1, ...`
///
/// # Panics
///
/// Panics on the first gap or duplicate
pub fn assert_consecutive_from(numbers: &[i64], start: i64) {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    for (offset, number) in sorted.iter().enumerate() {
        let expected = start + offset as i64;
        assert_eq!(
            *number, expected,
            "Issued numbers are not consecutive from {}: found {} at position {} in {:?}",
            start, number, offset, sorted
        );
    }
}

/// Asserts the arithmetic relations between the statistics fields
pub fn assert_statistics_consistent(stats: &SeriesStatistics) {
    assert_eq!(
        stats.total,
        stats.end_number - stats.start_number + 1,
        "total does not match range of {}",
        stats.series
    );
    assert_eq!(
        stats.used + stats.remaining,
        stats.total,
        "used + remaining != total for {}",
        stats.series
    );
    assert!(
        stats.usage_percentage <= 100,
        "usage {}% exceeds 100 for {}",
        stats.usage_percentage,
        stats.series
    );
}

/// Asserts the audit trail holds exactly these event types, in order
pub fn assert_event_types(events: &[RecordedEvent], expected: &[&str]) {
    let actual: Vec<&str> = events.iter().map(|e| e.event.event_type()).collect();
    assert_eq!(actual, expected, "Unexpected audit trail");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_accepts_shuffled() {
        assert_consecutive_from(&[1002, 1000, 1001], 1000);
        assert_consecutive_from(&[], 7);
    }

    #[test]
    #[should_panic(expected = "not consecutive")]
    fn test_consecutive_rejects_gap() {
        assert_consecutive_from(&[1000, 1002], 1000);
    }

    #[test]
    #[should_panic(expected = "not consecutive")]
    fn test_consecutive_rejects_duplicate() {
        assert_consecutive_from(&[1000, 1000], 1000);
    }
}

//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use domain_numbering::DealerStatus;
use proptest::prelude::*;

/// Strategy for valid series codes
pub fn series_code_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{2,4}[0-9]{0,2}"
}

/// Strategy for valid inclusive ranges of at most `max_len` numbers
pub fn range_strategy(max_len: i64) -> impl Strategy<Value = (i64, i64)> {
    (0i64..1_000_000i64, 0..max_len.max(1)).prop_map(|(start, len)| (start, start + len))
}

/// Strategy for a range together with a count of numbers to draw from it,
/// never more than the range holds
pub fn range_and_draws_strategy(max_len: i64) -> impl Strategy<Value = ((i64, i64), i64)> {
    range_strategy(max_len).prop_flat_map(|(start, end)| {
        let total = end - start + 1;
        (Just((start, end)), 0..=total)
    })
}

/// Strategy for dealer statuses
pub fn dealer_status_strategy() -> impl Strategy<Value = DealerStatus> {
    prop_oneof![
        Just(DealerStatus::Active),
        Just(DealerStatus::Inactive),
        Just(DealerStatus::Suspended),
    ]
}

//! Canonical policy number formatting
//!
//! A policy number is the series code followed by the issued integer,
//! zero-padded to the series' fixed digit width:
//!
//! ```text
//! MTR-24 + 1003 (width 6)  ->  MTR-24001003
//! ```
//!
//! The width is fixed when the series is created, so every number from a
//! series has the same length and the integer can always be recovered by
//! stripping the code and parsing the suffix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NumberingError;

/// Widest suffix a series may use; keeps every number inside `i64`.
pub const MAX_NUMBER_WIDTH: u32 = 18;

/// A formatted policy number together with its parts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyNumber {
    series: String,
    number: i64,
    width: u32,
}

impl PolicyNumber {
    /// Builds a policy number, rejecting integers that do not fit the width
    pub fn new(series: impl Into<String>, number: i64, width: u32) -> Result<Self, NumberingError> {
        if number < 0 {
            return Err(NumberingError::validation("policy numbers cannot be negative"));
        }
        if number > max_for_width(width) {
            return Err(NumberingError::validation(format!(
                "number {} does not fit in {} digits",
                number, width
            )));
        }
        Ok(Self {
            series: series.into(),
            number,
            width,
        })
    }

    /// Parses a formatted policy number issued from the given series
    ///
    /// # Errors
    ///
    /// Returns `NumberingError::Validation` if the prefix does not match,
    /// the suffix has the wrong length, or it contains non-digits.
    pub fn parse(formatted: &str, series: &str, width: u32) -> Result<Self, NumberingError> {
        let suffix = formatted.strip_prefix(series).ok_or_else(|| {
            NumberingError::validation(format!(
                "policy number '{}' does not belong to series '{}'",
                formatted, series
            ))
        })?;

        if suffix.len() != width as usize || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NumberingError::validation(format!(
                "policy number '{}' must end with exactly {} digits",
                formatted, width
            )));
        }

        let number = suffix
            .parse::<i64>()
            .map_err(|e| NumberingError::validation(e.to_string()))?;

        Self::new(series, number, width)
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

impl fmt::Display for PolicyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.series, self.number, width = self.width as usize)
    }
}

/// Number of decimal digits in a non-negative integer
pub fn digit_count(value: i64) -> u32 {
    if value <= 0 {
        1
    } else {
        value.ilog10() + 1
    }
}

/// Largest integer representable in `width` digits
pub fn max_for_width(width: u32) -> i64 {
    10_i64
        .checked_pow(width.min(MAX_NUMBER_WIDTH))
        .map(|limit| limit - 1)
        .unwrap_or(i64::MAX)
}

/// Width used for a new series: the configured minimum, widened to fit `end_number`
pub fn width_for(end_number: i64, min_width: u32) -> u32 {
    digit_count(end_number).max(min_width).min(MAX_NUMBER_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_zero_pads() {
        let number = PolicyNumber::new("MTR-24", 1003, 6).unwrap();
        assert_eq!(number.to_string(), "MTR-24001003");
    }

    #[test]
    fn test_parse_recovers_integer() {
        let parsed = PolicyNumber::parse("MTR-24001003", "MTR-24", 6).unwrap();
        assert_eq!(parsed.number(), 1003);
        assert_eq!(parsed.series(), "MTR-24");
    }

    #[test]
    fn test_parse_rejects_foreign_prefix() {
        assert!(PolicyNumber::parse("CAR001003", "MTR", 6).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_width() {
        assert!(PolicyNumber::parse("MTR01003", "MTR", 6).is_err());
        assert!(PolicyNumber::parse("MTR0001003", "MTR", 6).is_err());
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert!(PolicyNumber::parse("MTR00+003", "MTR", 6).is_err());
    }

    #[test]
    fn test_number_must_fit_width() {
        assert!(PolicyNumber::new("MTR", 1_000_000, 6).is_err());
        assert!(PolicyNumber::new("MTR", 999_999, 6).is_ok());
    }

    #[test]
    fn test_width_for_widens_to_end_number() {
        assert_eq!(width_for(1004, 6), 6);
        assert_eq!(width_for(12_345_678, 6), 8);
        assert_eq!(digit_count(0), 1);
        assert_eq!(max_for_width(4), 9999);
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_is_identity(
            number in 0i64..1_000_000_000,
            extra in 0u32..4,
        ) {
            let width = digit_count(number) + extra;
            let formatted = PolicyNumber::new("DLR7-", number, width).unwrap().to_string();
            let parsed = PolicyNumber::parse(&formatted, "DLR7-", width).unwrap();
            prop_assert_eq!(parsed.number(), number);
        }
    }
}

//! Usage statistics and depletion tracking
//!
//! Statistics are derived read-only from a series' range and current pointer:
//!
//! ```text
//! total     = end - start + 1
//! used      = min(current - start, total)
//! remaining = total - used
//! usage %   = round(used / total * 100)
//! ```
//!
//! # Depletion states
//!
//! ```text
//! Active -> NearDepletion -> Depleted
//! ```
//!
//! Only an explicit range extension moves a series back towards `Active`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use core_kernel::{DealerId, SeriesId};

use crate::series::PolicySeries;

/// Operator-configured warning boundary
///
/// A series is near depletion once either bound is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionThreshold {
    /// Warn when this many numbers or fewer remain
    pub remaining: i64,
    /// Warn when usage reaches this percentage
    pub usage_percent: u8,
}

impl Default for DepletionThreshold {
    fn default() -> Self {
        Self {
            remaining: 50,
            usage_percent: 90,
        }
    }
}

/// Depletion state of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesState {
    Active,
    NearDepletion,
    Depleted,
}

/// Derived usage figures for one series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    pub series_id: SeriesId,
    pub series: String,
    pub dealer_id: DealerId,
    pub start_number: i64,
    pub end_number: i64,
    pub current_number: i64,
    pub total: i64,
    pub used: i64,
    pub remaining: i64,
    pub usage_percentage: u8,
    pub is_near_depletion: bool,
    pub state: SeriesState,
}

impl SeriesStatistics {
    /// Computes statistics for a series against the given threshold
    pub fn compute(series: &PolicySeries, threshold: &DepletionThreshold) -> Self {
        let total = series.end_number() - series.start_number() + 1;
        let used = (series.current_number() - series.start_number()).clamp(0, total);
        let remaining = total - used;
        let usage_percentage = usage_percentage(used, total);

        let is_near_depletion =
            remaining <= threshold.remaining || usage_percentage >= threshold.usage_percent;

        let state = if remaining == 0 {
            SeriesState::Depleted
        } else if is_near_depletion {
            SeriesState::NearDepletion
        } else {
            SeriesState::Active
        };

        Self {
            series_id: series.id(),
            series: series.series().to_string(),
            dealer_id: series.dealer_id(),
            start_number: series.start_number(),
            end_number: series.end_number(),
            current_number: series.current_number(),
            total,
            used,
            remaining,
            usage_percentage,
            is_near_depletion,
            state,
        }
    }
}

/// Rounded usage percentage, half away from zero
pub fn usage_percentage(used: i64, total: i64) -> u8 {
    if total <= 0 {
        return 100;
    }
    let ratio = Decimal::from(used) * Decimal::ONE_HUNDRED / Decimal::from(total);
    ratio
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap_or(100)
        .min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percentage_rounds_half_away_from_zero() {
        assert_eq!(usage_percentage(0, 5), 0);
        assert_eq!(usage_percentage(1, 8), 13); // 12.5
        assert_eq!(usage_percentage(1, 3), 33);
        assert_eq!(usage_percentage(2, 3), 67);
        assert_eq!(usage_percentage(5, 5), 100);
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(SeriesState::Active < SeriesState::NearDepletion);
        assert!(SeriesState::NearDepletion < SeriesState::Depleted);
    }
}

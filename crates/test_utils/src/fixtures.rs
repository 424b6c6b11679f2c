//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for dealers, series and callers.
//! Names are randomized with `fake`; ranges are fixed so numbering
//! assertions stay predictable.

use core_kernel::{DealerId, OperationMetadata};
use domain_numbering::{Dealer, DealerStatus};
use fake::faker::company::en::CompanyName;
use fake::Fake;

/// Fixture for dealer test data
pub struct DealerFixtures;

impl DealerFixtures {
    /// An active dealer with a generated company name
    pub fn active() -> Dealer {
        Dealer::new(CompanyName().fake::<String>())
    }

    /// A dealer that may not own series
    pub fn inactive() -> Dealer {
        Self::active().with_status(DealerStatus::Inactive)
    }

    /// A suspended dealer
    pub fn suspended() -> Dealer {
        Self::active().with_status(DealerStatus::Suspended)
    }

    /// An id no directory knows about
    pub fn unknown_id() -> DealerId {
        DealerId::new()
    }
}

/// Fixture for series ranges used throughout the suites
pub struct RangeFixtures;

impl RangeFixtures {
    /// Five numbers, 1000 through 1004
    pub fn small() -> (i64, i64) {
        (1000, 1004)
    }

    /// A thousand numbers starting at one
    pub fn standard() -> (i64, i64) {
        (1, 1000)
    }

    /// A single number
    pub fn single() -> (i64, i64) {
        (500, 500)
    }

    /// Six-digit range that exercises zero padding
    pub fn padded() -> (i64, i64) {
        (1, 999_999)
    }
}

/// Fixture for caller metadata
pub struct MetadataFixtures;

impl MetadataFixtures {
    /// Metadata naming an operations administrator
    pub fn admin() -> OperationMetadata {
        OperationMetadata::initiated_by("ops-admin@example.com")
    }

    /// Metadata with no caller recorded
    pub fn anonymous() -> OperationMetadata {
        OperationMetadata::default()
    }
}

//! Dealers entitled to draw numbers from a series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::DealerId;

/// Dealer status as reported by the dealer directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealerStatus {
    Active,
    Inactive,
    Suspended,
}

impl DealerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealerStatus::Active => "active",
            DealerStatus::Inactive => "inactive",
            DealerStatus::Suspended => "suspended",
        }
    }
}

/// A dealer known to the dealer directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dealer {
    pub id: DealerId,
    pub name: String,
    pub status: DealerStatus,
    pub created_at: DateTime<Utc>,
}

impl Dealer {
    /// Creates a new active dealer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DealerId::new_v7(),
            name: name.into(),
            status: DealerStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// Returns a copy of the dealer with the given status
    pub fn with_status(mut self, status: DealerStatus) -> Self {
        self.status = status;
        self
    }

    /// Only active dealers may own a series
    pub fn can_own_series(&self) -> bool {
        self.status == DealerStatus::Active
    }
}

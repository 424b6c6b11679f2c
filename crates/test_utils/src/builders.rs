//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use std::sync::Arc;

use core_kernel::DealerId;
use domain_numbering::{
    AllocatorConfig, Dealer, InMemoryDealerDirectory, InMemorySeriesStore, NewSeries,
    PolicySeriesAllocator,
};

use crate::fixtures::{DealerFixtures, RangeFixtures};

/// Builder for series creation requests
pub struct NewSeriesBuilder {
    series: String,
    dealer_id: DealerId,
    description: Option<String>,
    start_number: i64,
    end_number: i64,
}

impl NewSeriesBuilder {
    /// Creates a builder for the given dealer with the standard range
    pub fn new(dealer_id: DealerId) -> Self {
        let (start_number, end_number) = RangeFixtures::standard();
        Self {
            series: "MTR".to_string(),
            dealer_id,
            description: None,
            start_number,
            end_number,
        }
    }

    /// Sets the series code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.series = code.into();
        self
    }

    /// Sets the inclusive range
    pub fn with_range(mut self, start: i64, end: i64) -> Self {
        self.start_number = start;
        self.end_number = end;
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builds the request
    pub fn build(self) -> NewSeries {
        NewSeries {
            series: self.series,
            dealer_id: self.dealer_id,
            description: self.description,
            start_number: self.start_number,
            end_number: self.end_number,
        }
    }
}

/// An allocator over in-memory adapters, with handles kept for inspection
pub struct TestAllocator {
    pub allocator: PolicySeriesAllocator,
    pub store: InMemorySeriesStore,
    pub dealers: InMemoryDealerDirectory,
}

/// Builder for [`TestAllocator`]
pub struct TestAllocatorBuilder {
    dealers: Vec<Dealer>,
    config: AllocatorConfig,
}

impl Default for TestAllocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAllocatorBuilder {
    /// Creates a builder with no dealers and the default configuration
    pub fn new() -> Self {
        Self {
            dealers: Vec::new(),
            config: AllocatorConfig::default(),
        }
    }

    /// Registers a dealer in the directory
    pub fn with_dealer(mut self, dealer: Dealer) -> Self {
        self.dealers.push(dealer);
        self
    }

    /// Registers a freshly generated active dealer
    pub fn with_active_dealer(self) -> Self {
        self.with_dealer(DealerFixtures::active())
    }

    /// Replaces the allocator configuration
    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the allocator
    pub async fn build(self) -> TestAllocator {
        let store = InMemorySeriesStore::new();
        let dealers = InMemoryDealerDirectory::with_dealers(self.dealers).await;
        let allocator = PolicySeriesAllocator::new(
            Arc::new(store.clone()),
            Arc::new(dealers.clone()),
            self.config,
        );
        TestAllocator {
            allocator,
            store,
            dealers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MetadataFixtures;

    #[test]
    fn test_new_series_builder_defaults() {
        let dealer_id = DealerId::new();
        let new = NewSeriesBuilder::new(dealer_id).build();

        assert_eq!(new.series, "MTR");
        assert_eq!(new.dealer_id, dealer_id);
        assert_eq!((new.start_number, new.end_number), RangeFixtures::standard());
        assert!(new.description.is_none());
    }

    #[tokio::test]
    async fn test_allocator_builder_registers_dealers() {
        let dealer = DealerFixtures::active();
        let test = TestAllocatorBuilder::new()
            .with_dealer(dealer.clone())
            .build()
            .await;

        let series = test
            .allocator
            .create_series(
                NewSeriesBuilder::new(dealer.id).with_range(1, 10).build(),
                &MetadataFixtures::admin(),
            )
            .await
            .unwrap();
        assert_eq!(test.allocator.get_next_number(series.id()).await.unwrap(), 1);
    }
}

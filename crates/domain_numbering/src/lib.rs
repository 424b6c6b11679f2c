//! Policy Numbering Domain
//!
//! This crate owns policy numbering series: bounded integer ranges bound to
//! a dealer, from which sequential policy numbers are issued.
//!
//! # Key Concepts
//!
//! - **PolicySeries**: Aggregate root holding the range, the next number to
//!   issue and the owning dealer
//! - **PolicyNumber**: Series code followed by the zero-padded issued number
//! - **SeriesStatistics**: Derived usage figures and depletion state
//! - **SeriesEvent**: Immutable record committed with every change; the
//!   `NumberIssued` events form the issuance log
//! - **PolicySeriesAllocator**: Service that serializes issuance per series
//!   and commits optimistically against the series version
//!
//! # Example
//!
//! ```rust,ignore
//! let allocator = PolicySeriesAllocator::new(store, dealers, AllocatorConfig::default());
//! let issued = allocator.generate_full_policy_number(series_id).await?;
//! println!("{}", issued.policy_number); // e.g. MTR001000
//! ```

pub mod allocator;
pub mod dealer;
pub mod error;
pub mod events;
pub mod memory;
pub mod policy_number;
pub mod ports;
pub mod series;
pub mod statistics;

pub use allocator::{AllocatorConfig, DeletionOutcome, IssuedPolicyNumber, PolicySeriesAllocator};
pub use dealer::{Dealer, DealerStatus};
pub use error::NumberingError;
pub use events::{Issuance, RecordedEvent, SeriesEvent};
pub use memory::{InMemoryDealerDirectory, InMemorySeriesStore};
pub use policy_number::PolicyNumber;
pub use ports::{CommitOutcome, DealerDirectory, SeriesCommit, SeriesQuery, SeriesStore};
pub use series::{NewSeries, PolicySeries, SeriesCode, SeriesRecord, SeriesUpdate};
pub use statistics::{DepletionThreshold, SeriesState, SeriesStatistics};

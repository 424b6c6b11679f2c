//! Repository implementations
//!
//! Repositories encapsulate SQL and map rows; they know nothing of the
//! domain types. Queries are built at runtime with `sqlx::query_as`, so the
//! crate compiles without a live database.
//!
//! - Writes that change a series are conditional on its version
//! - Events are appended in the same transaction as the change

pub mod dealer;
pub mod series;

pub use dealer::{DealerRepository, DealerRow, DealerStatus};
pub use series::{EventRow, IssuanceRow, SeriesRepository, SeriesRow, WriteResult};

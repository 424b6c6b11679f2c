//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! numbering service test suites.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built dealers, ranges and caller metadata
//! - `builders`: Builders for series requests and in-memory allocators
//! - `database`: PostgreSQL testcontainer with the schema applied
//! - `assertions`: Assertion helpers for issued numbers and statistics
//! - `generators`: Property-based test data generators

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;

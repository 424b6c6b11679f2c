//! Domain Adapters
//!
//! PostgreSQL implementations of the numbering domain ports. Each adapter
//! translates between domain types and repository rows and converts
//! `DatabaseError` into `PortError`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::adapters::{PostgresDealerDirectory, PostgresSeriesStore};
//!
//! let allocator = PolicySeriesAllocator::new(
//!     Arc::new(PostgresSeriesStore::new(pool.clone())),
//!     Arc::new(PostgresDealerDirectory::new(pool)),
//!     AllocatorConfig::default(),
//! );
//! ```

pub mod dealer;
pub mod series;

pub use dealer::PostgresDealerDirectory;
pub use series::PostgresSeriesStore;

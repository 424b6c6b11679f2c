//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the numbering service, built on SQLx.
//!
//! # Architecture
//!
//! - [`repositories`]: SQL and row types, no domain knowledge
//! - [`adapters`]: implementations of the domain ports over the repositories
//! - [`pool`]: connection pool configuration and embedded migrations
//!
//! # Concurrency
//!
//! Series rows carry a `version` column. Updates are conditional on the
//! version read by the caller, and the accompanying event (and issuance
//! record) are written in the same transaction, so a commit is atomic and
//! a lost race writes nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresSeriesStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/numbering")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresSeriesStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PostgresDealerDirectory, PostgresSeriesStore};
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool, MIGRATOR};

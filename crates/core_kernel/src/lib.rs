//! Core Kernel - Foundational types for the policy numbering service
//!
//! This crate provides the building blocks shared by every other crate:
//! - Strongly-typed identifiers for series, dealers and audit events
//! - The kernel error type
//! - Port infrastructure for the hexagonal architecture (errors, health checks, metadata)

pub mod identifiers;
pub mod error;
pub mod ports;

pub use identifiers::{SeriesId, DealerId, AuditEventId};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    OperationMetadata,
};

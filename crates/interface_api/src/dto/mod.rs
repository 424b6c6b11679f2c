//! Data transfer objects

pub mod series;

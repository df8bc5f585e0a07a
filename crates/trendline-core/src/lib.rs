//! # Trendline Core
//!
//! Deterministic building blocks for Trendline: item identity hashing,
//! deduplication, text cleaning, clustering quality scoring, daily trend
//! aggregation, and the storage traits the run orchestrator writes through.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Every function here is a synchronous batch
//! transform over data already in memory; the storage traits are the only
//! async surface and are implemented by the application crate (SQLite)
//! or by [`store::memory`] for tests.

pub mod clean;
pub mod cluster;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod models;
pub mod store;
pub mod trend;

pub use error::ValidationError;

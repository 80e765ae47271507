#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Durable state for the wildfire map.
//!
//! Incident data lives in memory for a session; the only state that
//! survives between sessions is small keyed text blobs (the geocode cache).
//! [`kv::KvStore`] abstracts where those blobs go: [`kv::DuckDbKvStore`]
//! keeps them in a `DuckDB` file under the data directory, and
//! [`kv::MemoryKvStore`] keeps them in memory for tests and dry runs.

pub mod kv;
pub mod paths;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `DuckDB` query or connection error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

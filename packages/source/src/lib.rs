#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wildfire record sources and normalization.
//!
//! Rows come from spreadsheet exports ([`spreadsheet`]) or the Safety Map
//! registry API ([`registry`]) as loosely-typed JSON objects, and
//! [`normalize::Normalizer`] turns them into canonical incident records.

pub mod columns;
pub mod normalize;
pub mod parsing;
pub mod progress;
pub mod registry;
pub mod spreadsheet;

pub use columns::ColumnAliases;
pub use normalize::{NormalizedBatch, Normalizer, RejectReason, RejectedRow};
pub use registry::{RegistryClient, RegistryConfig, RegistryPages};

/// Errors that can occur while reading or fetching source rows.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be opened or a sheet could not be read.
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Registry response was not well-formed XML.
    #[error("XML parse error: {message}")]
    Xml {
        /// Description of what went wrong.
        message: String,
    },

    /// Registry answered with a non-success result code.
    #[error("Registry API error {code}: {message}")]
    Api {
        /// Result code from the response header.
        code: String,
        /// Result message from the response header.
        message: String,
    },

    /// No registry API key is configured.
    #[error("Registry API key is not configured")]
    Unconfigured,

    /// Input or configuration is unusable.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

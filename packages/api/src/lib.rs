#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CARTO SQL and catalog API client.
//!
//! The import engine talks to the remote warehouse exclusively through the
//! [`SqlExecutor`] trait. [`CartoClient`] is the production implementation
//! against the CARTO SQL API; tests substitute recording executors.

pub mod catalog;
pub mod client;
pub mod config;
pub mod retry;

use async_trait::async_trait;

pub use catalog::{BestEffort, CatalogEntry, Connection};
pub use client::CartoClient;
pub use config::ApiConfig;

/// Errors that can occur while talking to the CARTO API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Remote SQL execution endpoint for a single CARTO connection.
///
/// Requests from one caller are assumed to be applied in submission order.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Runs a statement expected to return rows (query-parameter transport).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status, or a
    /// malformed response body.
    async fn execute_read(&self, connection: &str, sql: &str)
    -> Result<serde_json::Value, ApiError>;

    /// Runs DDL/DML with no meaningful result set (form-body transport).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-2xx status, or a
    /// malformed response body.
    async fn execute_write(
        &self,
        connection: &str,
        sql: &str,
    ) -> Result<serde_json::Value, ApiError>;
}

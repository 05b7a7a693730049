#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bulk layer import into CARTO-connected data warehouses.
//!
//! A [`Layer`](carto_import_models::Layer) is turned into one
//! `CREATE OR REPLACE TABLE` statement plus one `INSERT` per feature
//! ([`statement`]), the inserts are sliced into fixed-size batches
//! ([`batch`]), and each batch is wrapped in the target dialect's atomic
//! construct ([`atomic`]) before being sent through a
//! [`SqlExecutor`](carto_api::SqlExecutor). [`job::ImportJob`] drives the
//! whole pipeline with cooperative cancellation and progress reporting.

pub mod atomic;
pub mod batch;
pub mod geometry;
pub mod job;
pub mod progress;
pub mod query;
pub mod quoting;
pub mod statement;
pub mod type_mapping;
pub mod value;

use carto_api::ApiError;
use carto_import_models::ModelError;

pub use job::{CancelHandle, ImportJob, ImportOptions};

/// Errors that fail an import job.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Invalid dialect or table name.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The remote endpoint rejected a statement or could not be reached.
    #[error("Remote execution failed: {0}")]
    Transport(#[from] ApiError),

    /// A feature's attribute count does not match the layer's field list.
    #[error("Feature {feature} has {found} attribute values but the layer has {expected} fields")]
    FieldCountMismatch {
        /// Zero-based feature index.
        feature: usize,
        /// Number of fields in the layer.
        expected: usize,
        /// Number of attribute values on the feature.
        found: usize,
    },
}

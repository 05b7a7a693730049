#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core types shared by the CARTO layer import engine.
//!
//! A [`Layer`] is an in-memory table of [`Feature`]s described by an
//! ordered [`Field`] list. The import engine turns it into SQL for one of
//! the closed set of target [`Dialect`]s and writes it to a
//! [`TargetTable`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, FromRepr};

/// Errors produced while interpreting caller-supplied identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The connection's provider is not one of the supported dialects.
    #[error("Unsupported provider: {provider}")]
    UnsupportedDialect {
        /// Provider id as reported by the catalog.
        provider: String,
    },

    /// The fully-qualified table name does not have 1 to 3 non-empty segments.
    #[error("Invalid table name: {name:?}")]
    InvalidTableName {
        /// The rejected name.
        name: String,
    },
}

/// Target database flavor of a CARTO connection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    /// Google `BigQuery`
    BigQuery,
    /// Snowflake
    Snowflake,
    /// Amazon Redshift
    Redshift,
    /// `PostgreSQL` with `PostGIS`
    Postgres,
    /// Databricks over the SQL REST connector
    Databricks,
}

impl Dialect {
    /// Provider id used by the CARTO catalog for this dialect.
    #[must_use]
    pub const fn provider_id(self) -> &'static str {
        match self {
            Self::BigQuery => "bigquery",
            Self::Snowflake => "snowflake",
            Self::Redshift => "redshift",
            Self::Postgres => "postgres",
            Self::Databricks => "databricksRest",
        }
    }
}

impl FromStr for Dialect {
    type Err = ModelError;

    /// Parses a catalog provider id (case-insensitive). Both
    /// `"databricksRest"` and `"databricks"` name [`Dialect::Databricks`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bigquery" => Ok(Self::BigQuery),
            "snowflake" => Ok(Self::Snowflake),
            "redshift" => Ok(Self::Redshift),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "databricks" | "databricksrest" => Ok(Self::Databricks),
            _ => Err(ModelError::UnsupportedDialect {
                provider: s.to_string(),
            }),
        }
    }
}

/// Abstract field type of a source layer, independent of any dialect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SemanticType {
    /// Free text
    Text,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    LongInteger,
    /// Double precision floating point
    Float,
    /// Boolean
    Boolean,
    /// Geometry pseudo-type (used for the generated `geom` column)
    Geometry,
}

impl SemanticType {
    /// Whether values of this type are written as unquoted numeric literals.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::LongInteger | Self::Float)
    }
}

/// A named, typed column of a [`Layer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Abstract type of the column.
    pub semantic_type: SemanticType,
}

impl Field {
    /// Creates a field.
    #[must_use]
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
        }
    }
}

/// A single attribute value of a [`Feature`].
///
/// [`AttributeValue::Null`] is distinct from an empty
/// [`AttributeValue::Text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integral value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One record of a [`Layer`]: attribute values aligned positionally with
/// the layer's fields, plus an optional geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Attribute values in field order.
    pub attributes: Vec<AttributeValue>,
    /// Feature geometry, if any.
    pub geometry: Option<geo::Geometry<f64>>,
}

impl Feature {
    /// Creates a feature.
    #[must_use]
    pub const fn new(attributes: Vec<AttributeValue>, geometry: Option<geo::Geometry<f64>>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }
}

/// An in-memory feature layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    fields: Vec<Field>,
    features: Vec<Feature>,
}

impl Layer {
    /// Creates a layer from its field list and features.
    #[must_use]
    pub const fn new(fields: Vec<Field>, features: Vec<Feature>) -> Self {
        Self { fields, features }
    }

    /// Field list, in column order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Features, in source order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the layer has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A fully-qualified table name of 1 to 3 dot-separated segments
/// (`database.schema.table` or fewer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetTable {
    segments: Vec<String>,
}

impl TargetTable {
    /// Builds a three-segment name from catalog ids.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTableName`] if any segment is empty.
    pub fn new(database: &str, schema: &str, table: &str) -> Result<Self, ModelError> {
        format!("{database}.{schema}.{table}").parse()
    }

    /// The dot-separated segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every segment except the table itself, joined by dots
    /// (`database.schema` for a three-segment name).
    #[must_use]
    pub fn schema_path(&self) -> Option<String> {
        match self.segments.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(rest.join(".")),
            _ => None,
        }
    }

    /// The last segment.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }
}

impl FromStr for TargetTable {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.len() > 3 || segments.iter().any(String::is_empty) {
            return Err(ModelError::InvalidTableName {
                name: s.to_string(),
            });
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Lifecycle of an import job. Terminal states have no outgoing
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, FromRepr)]
#[repr(u8)]
pub enum JobState {
    /// Created but not started.
    Pending,
    /// Building statements or sending batches.
    Running,
    /// Every batch was acknowledged.
    Succeeded,
    /// Stopped between batches on request.
    Canceled,
    /// An error was captured.
    Failed,
}

impl JobState {
    /// Whether the state is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled | Self::Failed)
    }
}

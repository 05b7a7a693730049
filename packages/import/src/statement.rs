//! `CREATE TABLE` and `INSERT` statement generation.
//!
//! Pure and network-free. Column order is the layer's field order, with
//! the geometry appended last as the `geom` column, identically in the
//! `CREATE` and in every `INSERT`.

use carto_import_models::{Dialect, Feature, Field, Layer, SemanticType, TargetTable};

use crate::geometry::{self, GeometryValue as _};
use crate::value::{TextQuoting, format_value};
use crate::{ImportError, quoting, type_mapping};

/// Name of the generated geometry column.
pub const GEOMETRY_COLUMN: &str = "geom";

/// The statements needed to import a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSet {
    /// `CREATE OR REPLACE TABLE` statement.
    pub create: String,
    /// One `INSERT` per feature, in feature order.
    pub inserts: Vec<String>,
}

/// Builds the `CREATE OR REPLACE TABLE` statement for `fields`.
///
/// The table name is written as given, unquoted.
#[must_use]
pub fn create_table_statement(fields: &[Field], table: &TargetTable, dialect: Dialect) -> String {
    let mut columns: Vec<String> = fields
        .iter()
        .map(|field| {
            format!(
                "  {} {}",
                field.name,
                type_mapping::column_type(field.semantic_type, dialect)
            )
        })
        .collect();
    columns.push(format!(
        "  {GEOMETRY_COLUMN} {}",
        type_mapping::column_type(SemanticType::Geometry, dialect)
    ));

    format!(
        "CREATE OR REPLACE TABLE {table} (\n{}\n);",
        columns.join(",\n")
    )
}

/// Builds the `INSERT` statement for one feature.
///
/// `quoted_table` is the output of [`quoting::quote_table_name`].
///
/// # Errors
///
/// Returns [`ImportError::FieldCountMismatch`] if the feature's attribute
/// count differs from `fields.len()`.
pub fn insert_statement(
    index: usize,
    feature: &Feature,
    fields: &[Field],
    quoted_table: &str,
    dialect: Dialect,
    text_quoting: TextQuoting,
) -> Result<String, ImportError> {
    if feature.attributes.len() != fields.len() {
        return Err(ImportError::FieldCountMismatch {
            feature: index,
            expected: fields.len(),
            found: feature.attributes.len(),
        });
    }

    let mut values: Vec<String> = fields
        .iter()
        .zip(&feature.attributes)
        .map(|(field, value)| {
            format_value(value, field.semantic_type.is_numeric(), text_quoting)
        })
        .collect();

    values.push(match &feature.geometry {
        Some(geom) if !geom.is_empty() => geometry::encode(geom, dialect),
        _ => "NULL".to_string(),
    });

    Ok(format!(
        "INSERT INTO {quoted_table} VALUES ({});",
        values.join(", ")
    ))
}

/// Builds the `CREATE` statement and one `INSERT` per feature, in order.
///
/// # Errors
///
/// Returns [`ImportError::FieldCountMismatch`] for the first feature whose
/// attributes do not line up with the layer's fields.
pub fn build_statements(
    layer: &Layer,
    table: &TargetTable,
    dialect: Dialect,
    text_quoting: TextQuoting,
) -> Result<StatementSet, ImportError> {
    let create = create_table_statement(layer.fields(), table, dialect);
    let quoted_table = quoting::quote_table_name(table, dialect);

    let inserts = layer
        .features()
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            insert_statement(
                index,
                feature,
                layer.fields(),
                &quoted_table,
                dialect,
                text_quoting,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StatementSet { create, inserts })
}

//! Identifier quoting per dialect.
//!
//! Table and column quoting follow different rules: `PostgreSQL` and
//! Redshift only quote the database segment of a three-part table name,
//! Snowflake table names pass through untouched, yet all three quote
//! column names with double quotes.

use carto_import_models::{Dialect, TargetTable};

/// Quotes a fully-qualified table name for use in DML.
///
/// - `BigQuery`, Databricks: every segment backtick-quoted, embedded
///   backticks stripped.
/// - `PostgreSQL`, Redshift: for a three-segment name only the database
///   segment is double-quoted (embedded double quotes stripped); other
///   segment counts pass through.
/// - Snowflake: passes through.
#[must_use]
pub fn quote_table_name(table: &TargetTable, dialect: Dialect) -> String {
    match dialect {
        Dialect::BigQuery | Dialect::Databricks => table
            .segments()
            .iter()
            .map(|segment| format!("`{}`", segment.replace('`', "")))
            .collect::<Vec<_>>()
            .join("."),
        Dialect::Postgres | Dialect::Redshift => match table.segments() {
            [database, schema, name] => {
                format!("\"{}\".{schema}.{name}", database.replace('"', ""))
            }
            _ => table.to_string(),
        },
        Dialect::Snowflake => table.to_string(),
    }
}

/// Quotes a single column name.
#[must_use]
pub fn quote_column(name: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::BigQuery | Dialect::Databricks => format!("`{name}`"),
        Dialect::Postgres | Dialect::Redshift | Dialect::Snowflake => format!("\"{name}\""),
    }
}

//! Semantic field type to dialect column type mapping.

use carto_import_models::{Dialect, SemanticType};

/// Returns the column type used for `semantic_type` in `dialect`.
///
/// Geometry maps to the dialect's spatial column type, or to its text
/// type where geometries are stored as WKT ([`Dialect::Databricks`]).
#[must_use]
pub const fn column_type(semantic_type: SemanticType, dialect: Dialect) -> &'static str {
    match semantic_type {
        SemanticType::Text => text_type(dialect),
        SemanticType::Integer => match dialect {
            Dialect::BigQuery => "INT64",
            Dialect::Snowflake => "NUMBER(38,0)",
            Dialect::Redshift | Dialect::Databricks => "BIGINT",
            Dialect::Postgres => "INTEGER",
        },
        SemanticType::LongInteger => match dialect {
            Dialect::BigQuery => "INT64",
            Dialect::Snowflake => "NUMBER(38,0)",
            Dialect::Redshift | Dialect::Postgres | Dialect::Databricks => "BIGINT",
        },
        SemanticType::Float => match dialect {
            Dialect::BigQuery => "FLOAT64",
            Dialect::Snowflake => "FLOAT",
            Dialect::Redshift | Dialect::Postgres => "DOUBLE PRECISION",
            Dialect::Databricks => "DOUBLE",
        },
        SemanticType::Boolean => match dialect {
            Dialect::BigQuery => "BOOL",
            Dialect::Snowflake | Dialect::Redshift | Dialect::Postgres | Dialect::Databricks => {
                "BOOLEAN"
            }
        },
        SemanticType::Geometry => match dialect {
            Dialect::BigQuery | Dialect::Snowflake => "GEOGRAPHY",
            Dialect::Redshift | Dialect::Postgres => "GEOMETRY",
            Dialect::Databricks => text_type(dialect),
        },
    }
}

/// The dialect's general-purpose text column type.
#[must_use]
pub const fn text_type(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::BigQuery | Dialect::Databricks => "STRING",
        Dialect::Snowflake => "VARCHAR",
        Dialect::Redshift => "VARCHAR(MAX)",
        Dialect::Postgres => "TEXT",
    }
}

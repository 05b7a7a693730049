//! `SELECT` statements for downloading an imported table back.

use carto_import_models::{Dialect, TargetTable};
use geo::{Geometry, Rect};
use wkt::ToWkt as _;

use crate::quoting::{quote_column, quote_table_name};

/// Upper bound on rows fetched by a download query.
pub const MAX_ROWS: usize = 1_000_000;

/// Row filter of a download query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Every row.
    All,
    /// Rows whose geometry intersects the rectangle (lon/lat degrees).
    Extent(Rect<f64>),
    /// A raw `WHERE` clause body, sent as given.
    Where(String),
}

/// Builds `SELECT * FROM <table> [WHERE ...] LIMIT 1000000`.
///
/// `geometry_column` is only used by [`QueryFilter::Extent`]. It is
/// backtick-quoted where identifiers are case-insensitive and written bare
/// everywhere else, matching how `CREATE TABLE` declared it.
#[must_use]
pub fn download_query(
    table: &TargetTable,
    dialect: Dialect,
    geometry_column: &str,
    filter: &QueryFilter,
) -> String {
    let table = quote_table_name(table, dialect);
    let condition = match filter {
        QueryFilter::All => None,
        QueryFilter::Extent(rect) => {
            let polygon = Geometry::Polygon(rect.to_polygon()).wkt_string();
            Some(format!(
                "ST_INTERSECTS({}, ST_GEOGFROMTEXT('{polygon}'))",
                geometry_reference(geometry_column, dialect)
            ))
        }
        QueryFilter::Where(clause) if clause.trim().is_empty() => None,
        QueryFilter::Where(clause) => Some(clause.trim().to_string()),
    };

    condition.map_or_else(
        || format!("SELECT * FROM {table} LIMIT {MAX_ROWS}"),
        |condition| format!("SELECT * FROM {table} WHERE {condition} LIMIT {MAX_ROWS}"),
    )
}

fn geometry_reference(column: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::BigQuery | Dialect::Databricks => quote_column(column, dialect),
        Dialect::Snowflake | Dialect::Postgres | Dialect::Redshift => column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use carto_import_models::{Field, SemanticType};
    use geo::coord;

    use super::*;
    use crate::statement::{GEOMETRY_COLUMN, create_table_statement};

    fn table() -> TargetTable {
        "proj.ds.places".parse().unwrap()
    }

    #[test]
    fn unfiltered() {
        assert_eq!(
            download_query(&table(), Dialect::BigQuery, "geom", &QueryFilter::All),
            "SELECT * FROM `proj`.`ds`.`places` LIMIT 1000000"
        );
    }

    #[test]
    fn raw_where_clause() {
        assert_eq!(
            download_query(
                &table(),
                Dialect::Postgres,
                "geom",
                &QueryFilter::Where(" pop > 10 ".to_string())
            ),
            "SELECT * FROM \"proj\".ds.places WHERE pop > 10 LIMIT 1000000"
        );
    }

    #[test]
    fn blank_where_clause_is_ignored() {
        let sql = download_query(
            &table(),
            Dialect::Snowflake,
            "geom",
            &QueryFilter::Where("   ".to_string()),
        );
        assert_eq!(sql, "SELECT * FROM proj.ds.places LIMIT 1000000");
    }

    #[test]
    fn extent_filter_intersects_polygon() {
        let rect = Rect::new(coord! { x: -10.0, y: 35.0 }, coord! { x: 5.0, y: 45.0 });
        let sql = download_query(
            &table(),
            Dialect::BigQuery,
            "geom",
            &QueryFilter::Extent(rect),
        );
        assert!(
            sql.starts_with(
                "SELECT * FROM `proj`.`ds`.`places` WHERE ST_INTERSECTS(`geom`, ST_GEOGFROMTEXT('POLYGON(("
            ),
            "{sql}"
        );
        assert!(sql.ends_with("))')) LIMIT 1000000"), "{sql}");
        assert!(sql.contains("-10 35"), "{sql}");
    }

    #[test]
    fn extent_column_matches_created_column() {
        let table: TargetTable = "DB.PUBLIC.T".parse().unwrap();
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        for dialect in [Dialect::Snowflake, Dialect::Postgres, Dialect::Redshift] {
            let create = create_table_statement(
                &[Field::new("id", SemanticType::Integer)],
                &table,
                dialect,
            );
            assert!(create.contains(&format!("\n  {GEOMETRY_COLUMN} ")), "{create}");

            let sql = download_query(
                &table,
                dialect,
                GEOMETRY_COLUMN,
                &QueryFilter::Extent(rect),
            );
            assert!(
                sql.contains(&format!("ST_INTERSECTS({GEOMETRY_COLUMN}, ")),
                "{dialect}: {sql}"
            );
            assert!(!sql.contains("\"geom\""), "{dialect}: {sql}");
        }
    }
}

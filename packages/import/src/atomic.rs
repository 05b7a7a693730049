//! Per-dialect atomic execution units for a batch of statements.
//!
//! The SQL API has no multi-statement transaction, so each batch is
//! wrapped in whatever construct the dialect offers to run several
//! statements as one unit.

use carto_import_models::{Dialect, TargetTable};

/// A batch wrapped for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomicBlock {
    /// Redshift: a throwaway stored procedure. `create`, `call` and `drop`
    /// must be executed in that order, and `drop` must still be attempted
    /// when `call` fails.
    Procedure {
        /// Fully-qualified procedure name.
        name: String,
        /// `CREATE OR REPLACE PROCEDURE` statement.
        create: String,
        /// `CALL` statement.
        call: String,
        /// `DROP PROCEDURE` statement.
        drop: String,
    },
    /// A single SQL string: an anonymous block, a `BEGIN ... END;` block,
    /// or the bare statements where no block construct exists.
    Single(String),
}

impl AtomicBlock {
    /// The SQL strings to execute, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        match self {
            Self::Procedure {
                create, call, drop, ..
            } => vec![create.as_str(), call.as_str(), drop.as_str()],
            Self::Single(sql) => vec![sql.as_str()],
        }
    }
}

/// Wraps one batch of statements for `dialect`.
///
/// - Redshift: stored procedure triad (see [`AtomicBlock::Procedure`]).
/// - `PostgreSQL`: `DO $$ BEGIN ... END; $$;` anonymous block.
/// - Databricks: statements joined verbatim, no wrapping.
/// - `BigQuery`, Snowflake: `BEGIN ... END;` block.
#[must_use]
pub fn wrap(statements: &[String], dialect: Dialect, table: &TargetTable) -> AtomicBlock {
    let joined = statements.join("\n");
    match dialect {
        Dialect::Redshift => {
            let name = procedure_name(table);
            AtomicBlock::Procedure {
                create: format!(
                    "CREATE OR REPLACE PROCEDURE {name}()\nAS $$\nBEGIN\n{joined}\nEND;\n$$ LANGUAGE plpgsql;"
                ),
                call: format!("CALL {name}();"),
                drop: format!("DROP PROCEDURE {name}();"),
                name,
            }
        }
        Dialect::Postgres => AtomicBlock::Single(format!("DO $$\nBEGIN\n{joined}\nEND;\n$$;")),
        Dialect::Databricks => AtomicBlock::Single(joined),
        Dialect::BigQuery | Dialect::Snowflake => {
            AtomicBlock::Single(format!("BEGIN\n{joined}\nEND;"))
        }
    }
}

/// A fresh procedure name in the table's schema, unique across concurrent
/// jobs (random v4 UUID suffix).
#[must_use]
pub fn procedure_name(table: &TargetTable) -> String {
    let suffix = uuid::Uuid::new_v4().simple();
    table.schema_path().map_or_else(
        || format!("carto_{suffix}"),
        |schema| format!("{schema}.carto_{suffix}"),
    )
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point for importing `GeoJSON` layers into the data
//! warehouses behind CARTO connections.
//!
//! Uses `indicatif-log-bridge` (via [`carto_cli_utils::init_logger`]) so
//! log lines and the import progress bar share the terminal.

use std::error::Error;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use carto_api::{ApiConfig, CartoClient, Connection, SqlExecutor as _};
use carto_cli_utils::IndicatifProgress;
use carto_import::job::DEFAULT_BATCH_SIZE;
use carto_import::query::{QueryFilter, download_query};
use carto_import::statement::GEOMETRY_COLUMN;
use carto_import::value::TextQuoting;
use carto_import::{ImportJob, ImportOptions};
use carto_import_models::{Dialect, JobState, TargetTable};
use clap::{Parser, Subcommand};
use geo::{Rect, coord};

#[derive(Parser)]
#[command(name = "carto_cli", about = "Import GeoJSON layers into CARTO connections")]
struct Cli {
    /// TOML file overriding the built-in API settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a `GeoJSON` file into a new table
    Import {
        /// Path to a `GeoJSON` `FeatureCollection`
        file: PathBuf,
        /// Connection name
        #[arg(long)]
        connection: String,
        /// Destination table (`database.schema.table`)
        #[arg(long)]
        table: TargetTable,
        /// Warehouse dialect. Looked up from the connection when omitted.
        #[arg(long)]
        dialect: Option<Dialect>,
        /// Number of `INSERT` statements per atomic batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: NonZeroUsize,
        /// Double single quotes inside text values
        #[arg(long)]
        escape_quotes: bool,
    },
    /// Download rows of a table as JSON
    Query {
        /// Table to read (`database.schema.table`)
        table: TargetTable,
        /// Connection name
        #[arg(long)]
        connection: String,
        /// Warehouse dialect. Looked up from the connection when omitted.
        #[arg(long)]
        dialect: Option<Dialect>,
        /// Raw WHERE clause
        #[arg(long = "where", conflicts_with = "extent")]
        where_clause: Option<String>,
        /// Only rows intersecting `min_x,min_y,max_x,max_y` (degrees)
        #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
        extent: Option<Rect<f64>>,
        /// Geometry column used by `--extent`
        #[arg(long, default_value = GEOMETRY_COLUMN)]
        geom_column: String,
    },
    /// List connections
    Connections,
    /// List the databases of a connection
    Databases {
        /// Connection name or id
        connection: String,
    },
    /// List the schemas of a database
    Schemas {
        /// Connection name or id
        connection: String,
        /// Database id
        database: String,
    },
    /// List the tables of a schema
    Tables {
        /// Connection name or id
        connection: String,
        /// Database id
        database: String,
        /// Schema id
        schema: String,
    },
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let multi = carto_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = ApiConfig::load(cli.config.as_deref())?;
    let client = CartoClient::new(&config)?;

    match cli.command {
        Commands::Import {
            file,
            connection,
            table,
            dialect,
            batch_size,
            escape_quotes,
        } => {
            let dialect = resolve_dialect(&client, &connection, dialect).await?;
            let layer = carto_layer::load_geojson(&file)?;

            let options = ImportOptions::new(connection, dialect, table)
                .with_batch_size(batch_size)
                .with_text_quoting(if escape_quotes {
                    TextQuoting::Escaped
                } else {
                    TextQuoting::Verbatim
                });
            let progress = IndicatifProgress::import_bar(
                &multi,
                &format!("Importing {} into {}", display_name(&file), options.table),
            );
            let job = ImportJob::new(options, layer).with_progress(progress);

            let cancel = job.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted, stopping after the current batch");
                    cancel.cancel();
                }
            });

            match job.run(&client).await {
                JobState::Succeeded => {
                    println!("Imported {} into {}", file.display(), job.options().table);
                }
                JobState::Canceled => {
                    println!(
                        "Canceled import into {} at {}%",
                        job.options().table,
                        job.progress()
                    );
                }
                state => {
                    let reason = job
                        .error()
                        .map_or_else(|| state.to_string(), ToString::to_string);
                    return Err(format!("Import failed: {reason}").into());
                }
            }
        }
        Commands::Query {
            table,
            connection,
            dialect,
            where_clause,
            extent,
            geom_column,
        } => {
            let dialect = resolve_dialect(&client, &connection, dialect).await?;
            let filter = match (extent, where_clause) {
                (Some(rect), _) => QueryFilter::Extent(rect),
                (None, Some(clause)) => QueryFilter::Where(clause),
                (None, None) => QueryFilter::All,
            };
            let sql = download_query(&table, dialect, &geom_column, &filter);
            log::debug!("{sql}");

            let body = client.execute_read(&connection, &sql).await?;
            let rows = body.get("rows").unwrap_or(&body);
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        Commands::Connections => {
            let listing = client.connections().await;
            if let Some(e) = listing.error {
                return Err(format!("Could not list connections: {e}").into());
            }
            println!("{:<38} {:<16} NAME", "ID", "PROVIDER");
            println!("{}", "-".repeat(70));
            for connection in &listing.items {
                println!(
                    "{:<38} {:<16} {}",
                    connection.id, connection.provider_type, connection.name
                );
            }
        }
        Commands::Databases { connection } => {
            let connection = find_connection(&client, &connection).await?;
            for entry in client.databases(&connection.id).await? {
                println!("{:<30} {}", entry.id, entry.name);
            }
        }
        Commands::Schemas {
            connection,
            database,
        } => {
            let connection = find_connection(&client, &connection).await?;
            for entry in client.schemas(&connection.id, &database).await? {
                println!("{:<30} {}", entry.id, entry.name);
            }
        }
        Commands::Tables {
            connection,
            database,
            schema,
        } => {
            let connection = find_connection(&client, &connection).await?;
            for entry in client.tables(&connection.id, &database, &schema).await? {
                println!("{:<30} {}", entry.id, entry.name);
            }
        }
    }

    Ok(())
}

/// Finds a connection by name, falling back to its id.
async fn find_connection(client: &CartoClient, name: &str) -> Result<Connection, Box<dyn Error>> {
    let listing = client.connections().await;
    if let Some(e) = listing.error {
        return Err(format!("Could not list connections: {e}").into());
    }
    listing
        .items
        .into_iter()
        .find(|connection| connection.name == name || connection.id == name)
        .ok_or_else(|| format!("No connection named {name}").into())
}

async fn resolve_dialect(
    client: &CartoClient,
    connection: &str,
    dialect: Option<Dialect>,
) -> Result<Dialect, Box<dyn Error>> {
    if let Some(dialect) = dialect {
        return Ok(dialect);
    }
    let connection = find_connection(client, connection).await?;
    let dialect = connection.dialect()?;
    log::info!("Connection {} uses {dialect}", connection.name);
    Ok(dialect)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// Parses `min_x,min_y,max_x,max_y`.
fn parse_extent(value: &str) -> Result<Rect<f64>, String> {
    let numbers = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid coordinate {part:?}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match numbers.as_slice() {
        [min_x, min_y, max_x, max_y] => Ok(Rect::new(
            coord! { x: *min_x, y: *min_y },
            coord! { x: *max_x, y: *max_y },
        )),
        _ => Err(format!(
            "expected min_x,min_y,max_x,max_y, got {} values",
            numbers.len()
        )),
    }
}

//! Read-only catalog listing: connections, databases, schemas, tables.
//!
//! Each catalog node carries a dotted remote id; only the last segment is
//! significant to callers and is what [`CatalogEntry::id`] holds.

use carto_import_models::{Dialect, ModelError};
use serde::Deserialize;

use crate::{ApiError, CartoClient};

/// A listing that degrades to an empty list on failure while keeping the
/// failure visible to the caller.
#[derive(Debug)]
pub struct BestEffort<T> {
    /// Items that were loaded. Empty when `error` is set.
    pub items: Vec<T>,
    /// Why loading failed, if it did.
    pub error: Option<ApiError>,
}

impl<T> BestEffort<T> {
    /// Wraps a fallible listing.
    #[must_use]
    pub fn from_result(result: Result<Vec<T>, ApiError>) -> Self {
        match result {
            Ok(items) => Self { items, error: None },
            Err(error) => Self {
                items: Vec::new(),
                error: Some(error),
            },
        }
    }

    /// Whether the listing failed (as opposed to being genuinely empty).
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// A CARTO connection to a data warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Connection {
    /// Connection id.
    pub id: String,
    /// Connection name, used to address the SQL API.
    pub name: String,
    /// Provider id (e.g., `"bigquery"`, `"databricksRest"`).
    #[serde(rename = "provider_id")]
    pub provider_type: String,
}

impl Connection {
    /// The import dialect for this connection's provider.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedDialect`] for providers outside the
    /// supported set.
    pub fn dialect(&self) -> Result<Dialect, ModelError> {
        self.provider_type.parse()
    }
}

/// A database, schema or table node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Last dot-segment of the remote id.
    pub id: String,
    /// Display name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceNode {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceListing {
    #[serde(default)]
    children: Vec<ResourceNode>,
}

impl From<ResourceNode> for CatalogEntry {
    fn from(node: ResourceNode) -> Self {
        let id = node
            .id
            .rsplit('.')
            .next()
            .map_or_else(String::new, str::to_string);
        Self {
            id,
            name: node.name,
        }
    }
}

fn parse_children(body: serde_json::Value) -> Result<Vec<ResourceNode>, ApiError> {
    let listing: ResourceListing = serde_json::from_value(body)?;
    Ok(listing.children)
}

impl CartoClient {
    /// Lists the account's connections.
    ///
    /// Never fails: a transport or parse error yields an empty, degraded
    /// listing. Use [`BestEffort::is_degraded`] to tell the two apart.
    pub async fn connections(&self) -> BestEffort<Connection> {
        let listing = BestEffort::from_result(self.try_connections().await);
        if let Some(e) = &listing.error {
            log::warn!("Could not list connections: {e}");
        }
        listing
    }

    async fn try_connections(&self) -> Result<Vec<Connection>, ApiError> {
        let body = self.get_json("connections").await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Lists the databases of a connection.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request or response parsing fails.
    pub async fn databases(&self, connection_id: &str) -> Result<Vec<CatalogEntry>, ApiError> {
        let body = self
            .get_json(&format!("connections/{connection_id}/resources"))
            .await?;
        Ok(parse_children(body)?.into_iter().map(Into::into).collect())
    }

    /// Lists the schemas of a database.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request or response parsing fails.
    pub async fn schemas(
        &self,
        connection_id: &str,
        database: &str,
    ) -> Result<Vec<CatalogEntry>, ApiError> {
        let body = self
            .get_json(&format!("connections/{connection_id}/resources/{database}"))
            .await?;
        Ok(parse_children(body)?.into_iter().map(Into::into).collect())
    }

    /// Lists the tables of a schema. Views and other node kinds are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request or response parsing fails.
    pub async fn tables(
        &self,
        connection_id: &str,
        database: &str,
        schema: &str,
    ) -> Result<Vec<CatalogEntry>, ApiError> {
        let body = self
            .get_json(&format!(
                "connections/{connection_id}/resources/{database}.{schema}"
            ))
            .await?;
        Ok(tables_only(parse_children(body)?))
    }

    /// Returns the raw resource description of a table.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails.
    pub async fn table_info(
        &self,
        connection_id: &str,
        database: &str,
        schema: &str,
        table: &str,
    ) -> Result<serde_json::Value, ApiError> {
        self.get_json(&format!(
            "connections/{connection_id}/resources/{database}.{schema}.{table}"
        ))
        .await
    }
}

fn tables_only(nodes: Vec<ResourceNode>) -> Vec<CatalogEntry> {
    nodes
        .into_iter()
        .filter(|node| node.kind.as_deref() == Some("table"))
        .map(Into::into)
        .collect()
}

//! HTTP client for the CARTO SQL and workspace APIs.

use async_trait::async_trait;
use reqwest::Url;

use crate::config::ApiConfig;
use crate::{ApiError, SqlExecutor, retry};

/// Authenticated CARTO API client.
///
/// Constructed once from an [`ApiConfig`] and passed by reference to
/// whatever needs it. Holds no global state.
#[derive(Debug, Clone)]
pub struct CartoClient {
    http: reqwest::Client,
    base_url: Url,
    workspace_url: Url,
    token: String,
    client_id: String,
}

impl CartoClient {
    /// Creates a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if no token is configured or either
    /// base URL is invalid, and [`ApiError::Http`] if the HTTP client
    /// cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let token = config.token()?.to_string();
        let http = reqwest::Client::builder()
            .user_agent(concat!("carto-import/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: parse_base(&config.base_url)?,
            workspace_url: parse_base(&config.workspace_url)?,
            token,
            client_id: config.client_id.clone(),
        })
    }

    /// URL of the SQL query endpoint for `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the URL cannot be built.
    pub fn query_url(&self, connection: &str) -> Result<Url, ApiError> {
        join(&self.base_url, &format!("v3/sql/{connection}/query"))
    }

    /// Sends an authenticated GET to the workspace API and parses the JSON
    /// response. Transient failures are retried.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails after all retries or
    /// returns a non-2xx status.
    pub async fn get_json(&self, endpoint: &str) -> Result<serde_json::Value, ApiError> {
        let url = join(&self.workspace_url, endpoint)?;
        log::debug!("GET {url}");
        retry::send_json(|| {
            self.http
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&[("client", self.client_id.as_str())])
        })
        .await
    }
}

#[async_trait]
impl SqlExecutor for CartoClient {
    async fn execute_read(
        &self,
        connection: &str,
        sql: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.query_url(connection)?;
        // Unique leading comment so identical queries are never answered
        // from a cache.
        let query = format!("-- {}\n{sql}", uuid::Uuid::new_v4());
        log::debug!("GET {url} ({} bytes of SQL)", query.len());

        retry::send_json(|| {
            self.http
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&[("q", query.as_str()), ("client", self.client_id.as_str())])
        })
        .await
    }

    async fn execute_write(
        &self,
        connection: &str,
        sql: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.query_url(connection)?;
        log::debug!("POST {url} ({} bytes of SQL)", sql.len());

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .form(&[("q", sql)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn parse_base(raw: &str) -> Result<Url, ApiError> {
    // Without a trailing slash `Url::join` would replace the last path
    // segment instead of appending to it.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| ApiError::Config {
        message: format!("invalid base URL {raw:?}: {e}"),
    })
}

fn join(base: &Url, path: &str) -> Result<Url, ApiError> {
    base.join(path).map_err(|e| ApiError::Config {
        message: format!("cannot join {path:?} onto {base}: {e}"),
    })
}

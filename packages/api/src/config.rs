//! API endpoint and credential configuration.
//!
//! Defaults are embedded at compile time from `config/default.toml`. A
//! user TOML file may override any key, and the `CARTO_API_TOKEN`,
//! `CARTO_API_BASE_URL` and `CARTO_WORKSPACE_URL` environment variables
//! override both.

use std::path::Path;

use serde::Deserialize;

use crate::ApiError;

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "CARTO_API_TOKEN";
/// Environment variable overriding [`ApiConfig::base_url`].
pub const BASE_URL_ENV: &str = "CARTO_API_BASE_URL";
/// Environment variable overriding [`ApiConfig::workspace_url`].
pub const WORKSPACE_URL_ENV: &str = "CARTO_WORKSPACE_URL";

/// Resolved CARTO API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the SQL API (e.g., `"https://gcp-us-east1.api.carto.com/"`).
    pub base_url: String,
    /// Base URL of the workspace (catalog) API.
    pub workspace_url: String,
    /// Bearer token. Never read from the embedded defaults.
    #[serde(default)]
    pub token: Option<String>,
    /// Value sent as the `client` query parameter on GET requests.
    pub client_id: String,
}

/// Partial configuration read from a user file.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    base_url: Option<String>,
    workspace_url: Option<String>,
    token: Option<String>,
    client_id: Option<String>,
}

impl ApiConfig {
    /// Returns the compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Toml`] if the embedded defaults are malformed.
    pub fn defaults() -> Result<Self, ApiError> {
        Ok(toml::from_str(DEFAULT_CONFIG_TOML)?)
    }

    /// Loads the defaults, then applies `path` (if given) and the process
    /// environment on top.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        let mut config = Self::defaults()?;

        if let Some(path) = path {
            let contents = std::fs::read_to_string(path)?;
            let overrides: ConfigOverrides = toml::from_str(&contents)?;
            log::debug!("Loaded API config overrides from {}", path.display());
            config.apply(overrides);
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Returns the configured token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if no token has been configured.
    pub fn token(&self) -> Result<&str, ApiError> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Config {
                message: format!("no API token configured (set {TOKEN_ENV})"),
            })
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(workspace_url) = overrides.workspace_url {
            self.workspace_url = workspace_url;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if let Some(client_id) = overrides.client_id {
            self.client_id = client_id;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.apply(ConfigOverrides {
            base_url: lookup(BASE_URL_ENV),
            workspace_url: lookup(WORKSPACE_URL_ENV),
            token: lookup(TOKEN_ENV),
            client_id: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedded_defaults() {
        let config = ApiConfig::defaults().unwrap();
        assert!(config.base_url.ends_with('/'));
        assert!(config.workspace_url.ends_with('/'));
        assert!(!config.client_id.is_empty());
        assert_eq!(config.token, None);
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let config = ApiConfig::defaults().unwrap();
        assert!(matches!(config.token(), Err(ApiError::Config { .. })));
    }

    #[test]
    fn file_overrides_only_present_keys() {
        let mut config = ApiConfig::defaults().unwrap();
        let defaults = config.clone();
        let overrides: ConfigOverrides =
            toml::from_str("base_url = \"http://localhost:8080/\"").unwrap();
        config.apply(overrides);

        assert_eq!(config.base_url, "http://localhost:8080/");
        assert_eq!(config.workspace_url, defaults.workspace_url);
        assert_eq!(config.client_id, defaults.client_id);
    }

    #[test]
    fn environment_wins_over_file() {
        let mut config = ApiConfig::defaults().unwrap();
        config.apply(ConfigOverrides {
            token: Some("from-file".to_string()),
            ..ConfigOverrides::default()
        });
        config.apply_env(|key| (key == TOKEN_ENV).then(|| "from-env".to_string()));

        assert_eq!(config.token().unwrap(), "from-env");
    }
}

//! Configuration management for the server.

use crate::db::quote_ident;
use crate::zoho::{
    ZohoConfig, ZohoCredentials, DEFAULT_ACCOUNTS_URL, DEFAULT_API_BASE_URL, MAX_PER_PAGE,
};
use catalog_engine::{MirrorTables, SyncOptions, DEFAULT_MAX_PAGES};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Bearer token required to trigger a sync, if set
    pub auth_secret: Option<String>,
    /// Books API connection
    pub zoho: ZohoConfig,
    /// Mirror tables and page bound for each cycle
    pub sync: SyncOptions,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = var("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?;

        let auth_secret = var("AUTH_SECRET");

        let organization_id =
            var("ZOHO_ORGANIZATION_ID").ok_or(ConfigError::Missing("ZOHO_ORGANIZATION_ID"))?;

        let credentials = match var("ZOHO_ACCESS_TOKEN") {
            Some(token) => ZohoCredentials::AccessToken(token),
            None => match (
                var("ZOHO_CLIENT_ID"),
                var("ZOHO_CLIENT_SECRET"),
                var("ZOHO_REFRESH_TOKEN"),
            ) {
                (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                    ZohoCredentials::RefreshToken {
                        client_id,
                        client_secret,
                        refresh_token,
                    }
                }
                _ => return Err(ConfigError::MissingZohoCredentials),
            },
        };

        let per_page = match var("ZOHO_PER_PAGE") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_PER_PAGE).contains(n))
                .ok_or(ConfigError::InvalidPerPage(value))?,
            None => MAX_PER_PAGE,
        };

        let max_pages = match var("SYNC_MAX_PAGES") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or(ConfigError::InvalidMaxPages(value))?,
            None => DEFAULT_MAX_PAGES,
        };

        let defaults = MirrorTables::default();
        let tables = MirrorTables {
            items: table_name(&var, "MIRROR_TABLE", defaults.items)?,
            audit: table_name(&var, "AUDIT_TABLE", defaults.audit)?,
            metadata: table_name(&var, "METADATA_TABLE", defaults.metadata)?,
        };

        let sync = SyncOptions::new(tables, max_pages)
            .map_err(|e| ConfigError::InvalidMaxPages(e.to_string()))?;

        Ok(Self {
            host,
            port,
            database_url,
            auth_secret,
            zoho: ZohoConfig {
                organization_id,
                api_base_url: var("ZOHO_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
                accounts_url: var("ZOHO_ACCOUNTS_URL")
                    .unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()),
                credentials,
                per_page,
            },
            sync,
        })
    }
}

fn table_name(
    var: impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: String,
) -> Result<String, ConfigError> {
    match var(key) {
        Some(name) if quote_ident(&name).is_some() => Ok(name),
        Some(name) => Err(ConfigError::InvalidTableName { var: key, name }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error(
        "Zoho credentials are required: set ZOHO_ACCESS_TOKEN, or all of \
         ZOHO_CLIENT_ID, ZOHO_CLIENT_SECRET and ZOHO_REFRESH_TOKEN"
    )]
    MissingZohoCredentials,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid ZOHO_PER_PAGE value {0:?}: expected 1 to 200")]
    InvalidPerPage(String),

    #[error("Invalid SYNC_MAX_PAGES value {0:?}: expected a positive integer")]
    InvalidMaxPages(String),

    #[error("Invalid {var} value {name:?}: expected a plain SQL identifier")]
    InvalidTableName { var: &'static str, name: String },
}

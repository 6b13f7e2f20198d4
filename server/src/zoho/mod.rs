//! Zoho Books API access: the remote item catalog and its OAuth credentials.

mod auth;
mod client;

pub use auth::*;
pub use client::*;

use std::fmt;

/// Default Books API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://books.zoho.com/api/v3";

/// Default OAuth accounts host.
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.zoho.com";

/// Redirect URI registered for self-client grant codes.
pub const DEFAULT_REDIRECT_URI: &str = "https://www.zoho.com/books";

/// Largest page size the items endpoint accepts.
pub const MAX_PER_PAGE: u32 = 200;

/// Connection settings for the Books API.
#[derive(Debug, Clone)]
pub struct ZohoConfig {
    pub organization_id: String,
    /// Base URL of the Books API, without a trailing slash
    pub api_base_url: String,
    /// OAuth host used for token grants
    pub accounts_url: String,
    pub credentials: ZohoCredentials,
    /// Records requested per page
    pub per_page: u32,
}

/// How the client obtains an access token.
#[derive(Clone)]
pub enum ZohoCredentials {
    /// A pre-issued access token used as is.
    AccessToken(String),
    /// The OAuth refresh-token grant.
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl fmt::Debug for ZohoCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZohoCredentials::AccessToken(_) => f.write_str("AccessToken(..)"),
            ZohoCredentials::RefreshToken { client_id, .. } => f
                .debug_struct("RefreshToken")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Errors raised while talking to Zoho.
#[derive(Debug, thiserror::Error)]
pub enum ZohoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zoho responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Zoho API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("malformed Zoho response: {0}")]
    MalformedResponse(String),

    #[error("token request failed: {0}")]
    AuthFailed(String),
}

/// Keep error bodies short enough to log.
fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 512;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let mut short: String = body.chars().take(LIMIT).collect();
        short.push_str("...");
        short
    }
}

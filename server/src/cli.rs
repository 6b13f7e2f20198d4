//! Command-line interface.
//!
//! # Commands
//!
//! - `serve` - Run the sync server (the default without a command)
//! - `exchange-code` - Turn a Zoho grant code into access and refresh tokens

use crate::zoho::{
    http_client, TokenProvider, ZohoError, DEFAULT_ACCOUNTS_URL, DEFAULT_REDIRECT_URI,
};
use clap::{Parser, Subcommand};

/// Mirror a Zoho Books item catalog into PostgreSQL.
#[derive(Debug, Parser)]
#[command(name = "catalog-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the sync server
    Serve,

    /// Exchange an authorization grant code for access and refresh tokens
    ExchangeCode {
        /// Grant code generated in the Zoho API console
        #[arg(long)]
        code: String,

        /// Redirect URI registered for the client
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,

        #[arg(long, env = "ZOHO_CLIENT_ID")]
        client_id: String,

        #[arg(long, env = "ZOHO_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,

        /// OAuth accounts host of the organization's data center
        #[arg(long, env = "ZOHO_ACCOUNTS_URL", default_value = DEFAULT_ACCOUNTS_URL)]
        accounts_url: String,
    },
}

/// Run `exchange-code`: print the issued tokens as JSON.
pub async fn exchange_code(
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
    accounts_url: &str,
) -> Result<(), ZohoError> {
    let http = http_client()?;
    let tokens = TokenProvider::exchange_grant_code(
        &http,
        accounts_url,
        client_id,
        client_secret,
        code,
        redirect_uri,
    )
    .await?;

    if tokens.refresh_token.is_none() {
        tracing::warn!("no refresh token issued; request the grant code with offline access");
    }

    let json = serde_json::to_string_pretty(&tokens)
        .map_err(|e| ZohoError::MalformedResponse(e.to_string()))?;
    println!("{json}");

    Ok(())
}

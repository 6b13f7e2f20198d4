//! Catalog Sync Server - mirrors a Zoho Books item catalog into PostgreSQL.
//!
//! This server exposes HTTP endpoints that run catalog-engine reconciliation
//! cycles on demand and read back the mirror, its audit trail and the sync
//! metadata.

mod auth;
mod cli;
mod config;
mod db;
mod error;
mod handlers;
mod routes;
mod zoho;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::db::Pool;
use crate::zoho::{ZohoClient, ZohoError};
use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub zoho: ZohoClient,
    /// Held for the duration of a sync cycle
    pub sync_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pool: Pool, config: Config) -> Result<Self, ZohoError> {
        let zoho = ZohoClient::new(config.zoho.clone())?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            zoho,
            sync_lock: Arc::new(Mutex::new(())),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "catalog_server=debug,catalog_engine=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env before parsing so arguments can fall back to it
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::ExchangeCode {
            code,
            redirect_uri,
            client_id,
            client_secret,
            accounts_url,
        } => {
            cli::exchange_code(&code, &redirect_uri, &client_id, &client_secret, &accounts_url)
                .await?;
            Ok(())
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Catalog Sync Server on {}:{}",
        config.host,
        config.port
    );

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    db::ensure_tables(&pool, &config.sync.tables).await?;

    // Build application state
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool, config)?;

    // Build router
    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! Paged reads of the Books item catalog.

use super::{truncate_body, TokenProvider, ZohoConfig, ZohoError};
use catalog_engine::{Page, PageNumber, RemoteSource};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by Books API and OAuth requests.
pub fn http_client() -> Result<Client, ZohoError> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

#[derive(Serialize)]
struct ItemsQuery<'a> {
    organization_id: &'a str,
    page: PageNumber,
    per_page: u32,
}

/// HTTP client for the Books `items` endpoint.
///
/// Clones share the HTTP connection pool and the token cache.
#[derive(Debug, Clone)]
pub struct ZohoClient {
    http: Client,
    config: Arc<ZohoConfig>,
    tokens: TokenProvider,
}

impl ZohoClient {
    pub fn new(config: ZohoConfig) -> Result<Self, ZohoError> {
        let http = http_client()?;
        let tokens = TokenProvider::new(
            http.clone(),
            config.accounts_url.clone(),
            config.credentials.clone(),
        );

        Ok(Self {
            http,
            config: Arc::new(config),
            tokens,
        })
    }

    /// Fetch one page of items.
    ///
    /// A 401 is retried once with a freshly refreshed token when the refresh
    /// grant is configured.
    pub async fn items_page(&self, page: PageNumber) -> Result<Page, ZohoError> {
        let mut response = self.request_items(page).await?;
        if response.status() == StatusCode::UNAUTHORIZED && self.tokens.can_refresh() {
            warn!(page, "Zoho rejected the access token, refreshing");
            self.tokens.invalidate().await;
            response = self.request_items(page).await?;
        }

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ZohoError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let page_data = parse_items_page(&body, self.config.per_page)?;
        debug!(
            page,
            records = page_data.records.len(),
            has_more = page_data.has_more,
            "received Zoho items page"
        );
        Ok(page_data)
    }

    async fn request_items(&self, page: PageNumber) -> Result<Response, ZohoError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/items", self.config.api_base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Zoho-oauthtoken {token}"))
            .query(&ItemsQuery {
                organization_id: &self.config.organization_id,
                page,
                per_page: self.config.per_page,
            })
            .send()
            .await?;

        Ok(response)
    }
}

impl RemoteSource for ZohoClient {
    type Error = ZohoError;

    async fn fetch_page(&mut self, page: PageNumber) -> Result<Page, Self::Error> {
        self.items_page(page).await
    }
}

/// Parse the body of a successful `items` response.
///
/// The body must carry `code == 0` and an `items` array. `has_more` comes from
/// `page_context.has_more_page`; without it a full page is taken to mean more
/// pages follow.
pub fn parse_items_page(body: &str, per_page: u32) -> Result<Page, ZohoError> {
    let mut body: Value = serde_json::from_str(body)
        .map_err(|e| ZohoError::MalformedResponse(format!("items response: {e}")))?;

    let code = body
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| ZohoError::MalformedResponse("items response has no code".into()))?;
    if code != 0 {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ZohoError::Api { code, message });
    }

    let has_more_page = body
        .get("page_context")
        .and_then(|context| context.get("has_more_page"))
        .and_then(Value::as_bool);

    let records = match body.get_mut("items").map(Value::take) {
        Some(Value::Array(records)) => records,
        _ => {
            return Err(ZohoError::MalformedResponse(
                "items response has no items array".into(),
            ))
        }
    };

    let has_more = has_more_page.unwrap_or(records.len() == per_page as usize);
    Ok(Page::new(records, has_more))
}

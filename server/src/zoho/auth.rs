//! OAuth access tokens for the Books API.

use super::{truncate_body, ZohoCredentials, ZohoError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Refresh this long before the token's reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Body of the token endpoint. Zoho reports grant errors with HTTP 200 and an
/// `error` field.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

/// A token issued by the accounts server.
struct IssuedToken {
    access_token: String,
    refresh_token: Option<String>,
    lifetime: Duration,
}

/// Tokens issued in exchange for an authorization grant code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantedTokens {
    pub access_token: String,
    /// Only issued for offline access grants
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires
    pub expires_in: u64,
}

/// Supplies bearer credentials for the Books API.
///
/// With a static token it hands that token out unchanged. With the refresh
/// grant it caches the issued token until shortly before it expires. Clones
/// share the cache.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    http: Client,
    accounts_url: String,
    credentials: ZohoCredentials,
    cache: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(
        http: Client,
        accounts_url: impl Into<String>,
        credentials: ZohoCredentials,
    ) -> Self {
        Self {
            http,
            accounts_url: accounts_url.into(),
            credentials,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// The current access token.
    pub async fn access_token(&self) -> Result<String, ZohoError> {
        let (client_id, client_secret, refresh_token) = match &self.credentials {
            ZohoCredentials::AccessToken(token) => return Ok(token.clone()),
            ZohoCredentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => (client_id, client_secret, refresh_token),
        };

        // Held across the grant so concurrent callers wait for a single refresh.
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let token = self
            .refresh(client_id, client_secret, refresh_token)
            .await?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    /// Whether a rejected token can be replaced by refreshing.
    pub fn can_refresh(&self) -> bool {
        matches!(self.credentials, ZohoCredentials::RefreshToken { .. })
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Exchange a one-time authorization grant code for tokens.
    ///
    /// Grant codes come from the Zoho API console and expire within minutes.
    /// The returned refresh token is what `ZOHO_REFRESH_TOKEN` expects.
    pub async fn exchange_grant_code(
        http: &Client,
        accounts_url: &str,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<GrantedTokens, ZohoError> {
        let issued = request_token(
            http,
            accounts_url,
            &[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ],
        )
        .await?;
        debug!(
            expires_in = issued.lifetime.as_secs(),
            offline = issued.refresh_token.is_some(),
            "exchanged Zoho grant code"
        );

        Ok(GrantedTokens {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_in: issued.lifetime.as_secs(),
        })
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<CachedToken, ZohoError> {
        let issued = request_token(
            &self.http,
            &self.accounts_url,
            &[
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "refresh_token"),
            ],
        )
        .await?;
        debug!(expires_in = issued.lifetime.as_secs(), "refreshed Zoho access token");

        Ok(CachedToken {
            value: issued.access_token,
            refresh_at: Instant::now() + issued.lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}

/// POST a grant to the token endpoint.
async fn request_token(
    http: &Client,
    accounts_url: &str,
    params: &[(&str, &str)],
) -> Result<IssuedToken, ZohoError> {
    let url = format!("{}/oauth/v2/token", accounts_url.trim_end_matches('/'));
    let response = http.post(&url).query(params).send().await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ZohoError::AuthFailed(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate_body(&body)
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| ZohoError::MalformedResponse(format!("token response: {e}")))?;
    if let Some(error) = parsed.error {
        return Err(ZohoError::AuthFailed(error));
    }
    let access_token = parsed
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ZohoError::AuthFailed("response carried no access_token".into()))?;

    Ok(IssuedToken {
        access_token,
        refresh_token: parsed.refresh_token.filter(|token| !token.is_empty()),
        lifetime: parsed
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn refresh_credentials() -> ZohoCredentials {
        ZohoCredentials::RefreshToken {
            client_id: "1000.CLIENT".into(),
            client_secret: "secret".into(),
            refresh_token: "1000.refresh".into(),
        }
    }

    #[tokio::test]
    async fn static_token_is_returned_without_requests() {
        let server = MockServer::start().await;
        let provider = TokenProvider::new(
            Client::new(),
            server.uri(),
            ZohoCredentials::AccessToken("static".into()),
        );

        assert_eq!(provider.access_token().await.unwrap(), "static");
        assert!(!provider.can_refresh());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refreshed_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(query_param("refresh_token", "1000.refresh"))
            .and(query_param("client_id", "1000.CLIENT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "1000.fresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), server.uri(), refresh_credentials());

        assert_eq!(provider.access_token().await.unwrap(), "1000.fresh");
        assert_eq!(provider.access_token().await.unwrap(), "1000.fresh");
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "1000.fresh", "expires_in": 3600})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), server.uri(), refresh_credentials());
        provider.access_token().await.unwrap();
        provider.invalidate().await;
        provider.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn short_lived_token_is_not_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "1000.brief", "expires_in": 30})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), server.uri(), refresh_credentials());
        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn grant_error_in_ok_body_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_code"})),
            )
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), server.uri(), refresh_credentials());
        let err = provider.access_token().await.unwrap_err();

        assert!(matches!(err, ZohoError::AuthFailed(ref msg) if msg == "invalid_code"));
    }

    #[tokio::test]
    async fn http_failure_fails_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), server.uri(), refresh_credentials());
        let err = provider.access_token().await.unwrap_err();

        assert_eq!(err.to_string(), "token request failed: HTTP 500: boom");
    }

    #[tokio::test]
    async fn grant_code_exchange_returns_both_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .and(query_param("grant_type", "authorization_code"))
            .and(query_param("code", "1000.grant"))
            .and(query_param("client_id", "1000.CLIENT"))
            .and(query_param("client_secret", "secret"))
            .and(query_param("redirect_uri", "https://www.zoho.com/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "1000.access",
                "refresh_token": "1000.refresh",
                "api_domain": "https://www.zohoapis.com",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = TokenProvider::exchange_grant_code(
            &Client::new(),
            &server.uri(),
            "1000.CLIENT",
            "secret",
            "1000.grant",
            "https://www.zoho.com/books",
        )
        .await
        .unwrap();

        assert_eq!(
            tokens,
            GrantedTokens {
                access_token: "1000.access".into(),
                refresh_token: Some("1000.refresh".into()),
                expires_in: 3600,
            }
        );
    }

    #[tokio::test]
    async fn expired_grant_code_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_code"})),
            )
            .mount(&server)
            .await;

        let err = TokenProvider::exchange_grant_code(
            &Client::new(),
            &server.uri(),
            "1000.CLIENT",
            "secret",
            "1000.stale",
            "https://www.zoho.com/books",
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "token request failed: invalid_code");
    }
}

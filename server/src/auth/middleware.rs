//! Authentication middleware.
//!
//! Triggering a sync is guarded by a shared Bearer secret. Without a
//! configured secret every caller is allowed.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use subtle::ConstantTimeEq;

use crate::AppState;

/// Proof that the caller may trigger sync cycles.
#[derive(Debug, Clone, Copy)]
pub struct SyncAuth;

impl FromRequestParts<AppState> for SyncAuth {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.config.auth_secret.as_deref() else {
            return Ok(SyncAuth);
        };

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) if bearer_matches(token, secret) => Ok(SyncAuth),
                Some(_) => Err((StatusCode::UNAUTHORIZED, "Invalid bearer token")),
                None => Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid authorization header format",
                )),
            },
            None => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
        }
    }
}

/// Compare a presented token with the secret in constant time.
fn bearer_matches(token: &str, secret: &str) -> bool {
    token.as_bytes().ct_eq(secret.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_comparison() {
        assert!(bearer_matches("s3cret", "s3cret"));
        assert!(!bearer_matches("s3cre", "s3cret"));
        assert!(!bearer_matches("s3cret!", "s3cret"));
        assert!(!bearer_matches("S3CRET", "s3cret"));
        assert!(!bearer_matches("", "s3cret"));
    }
}

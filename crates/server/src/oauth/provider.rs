//! The OAuth provider strategy trait.
//!
//! A provider is a pluggable adapter that drives the authorization-code
//! handshake against one upstream identity provider and maps the returned
//! profile payload onto [`EntityData`], the normalized set of fields this
//! service merges into a user record.

use crate::error::OAuthFlowError;
use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
    pub scopes: Option<String>,
}

/// Normalized profile fields extracted from a provider's profile response.
///
/// This is the only data that ever reaches a user record; raw provider
/// payloads stay inside the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityData {
    /// Provider-side stable user identifier.
    pub subject: String,
    pub email: Option<String>,
    /// Whether the provider asserts the email is verified. Controls the
    /// account-matching rules in the identity service.
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Standard OAuth2 token endpoint response shape (RFC 6749 §5.1).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_tokens(self) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|secs| OffsetDateTime::now_utc() + time::Duration::seconds(secs)),
            scopes: self.scope,
        }
    }
}

/// A pluggable OAuth login strategy.
#[async_trait]
pub trait OAuthProvider: Send + Sync + std::fmt::Debug {
    /// Registry key, also used in the callback path.
    fn name(&self) -> &str;

    /// Full authorization URL to redirect the browser to.
    fn authorize_url(&self, state: &str, pkce_challenge: &str) -> String;

    /// Exchange an authorization code for provider tokens.
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderTokens, OAuthFlowError>;

    /// Fetch the raw profile payload with a provider access token.
    async fn fetch_profile(&self, access_token: &str)
    -> Result<serde_json::Value, OAuthFlowError>;

    /// Map the raw profile payload onto normalized entity data.
    ///
    /// This is the strategy's override point: subclassing a provider in the
    /// original system amounted to replacing exactly this mapping.
    fn entity_data(&self, profile: &serde_json::Value) -> Result<EntityData, OAuthFlowError>;
}

/// Shared helper: POST a standard authorization-code token request.
pub(crate) async fn post_token_request(
    http: &reqwest::Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<ProviderTokens, OAuthFlowError> {
    let response = http
        .post(token_url)
        .header("Accept", "application/json")
        .form(params)
        .send()
        .await
        .map_err(|e| OAuthFlowError::TokenExchange(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OAuthFlowError::TokenExchange(e.to_string()))?;

    if !status.is_success() {
        return Err(OAuthFlowError::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| OAuthFlowError::TokenExchange(format!("parse error: {e}")))?;
    Ok(parsed.into_tokens())
}

/// Shared helper: GET a profile endpoint with a Bearer token.
pub(crate) async fn get_profile(
    http: &reqwest::Client,
    profile_url: &str,
    access_token: &str,
) -> Result<serde_json::Value, OAuthFlowError> {
    let response = http
        .get(profile_url)
        .header("Accept", "application/json")
        .header("User-Agent", "relay-login")
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| OAuthFlowError::ProfileFetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OAuthFlowError::ProfileFetch(format!(
            "profile endpoint returned {status}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OAuthFlowError::ProfileFetch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_computes_expiry() {
        let resp = TokenResponse {
            access_token: "tok".into(),
            refresh_token: Some("refresh".into()),
            expires_in: Some(3600),
            scope: Some("read:user".into()),
        };
        let tokens = resp.into_tokens();
        assert_eq!(tokens.access_token, "tok");
        let expires = tokens.expires_at.expect("expiry set");
        assert!(expires > OffsetDateTime::now_utc());
    }

    #[test]
    fn token_response_without_expiry() {
        let resp = TokenResponse {
            access_token: "tok".into(),
            refresh_token: None,
            expires_in: None,
            scope: None,
        };
        let tokens = resp.into_tokens();
        assert!(tokens.expires_at.is_none());
        assert!(tokens.refresh_token.is_none());
    }
}

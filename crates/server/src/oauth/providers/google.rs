//! Google OAuth provider strategy (OIDC userinfo).

use crate::config::ProviderConfig;
use crate::error::OAuthFlowError;
use crate::oauth::provider::{
    EntityData, OAuthProvider, ProviderTokens, get_profile, post_token_request,
};
use async_trait::async_trait;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PROFILE_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const DEFAULT_SCOPES: &str = "openid email profile";

#[derive(Debug)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: &ProviderConfig, redirect_uri: String, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri,
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            http,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorize_url(&self, state: &str, pkce_challenge: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(state),
            urlencoding::encode(pkce_challenge),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderTokens, OAuthFlowError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code_verifier", pkce_verifier),
        ];
        post_token_request(&self.http, TOKEN_URL, &params).await
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<serde_json::Value, OAuthFlowError> {
        get_profile(&self.http, PROFILE_URL, access_token).await
    }

    fn entity_data(&self, profile: &serde_json::Value) -> Result<EntityData, OAuthFlowError> {
        oidc_entity_data(profile)
    }
}

/// Standard OIDC userinfo claim mapping, shared with the generic provider.
pub(crate) fn oidc_entity_data(profile: &serde_json::Value) -> Result<EntityData, OAuthFlowError> {
    let subject = profile
        .get("sub")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| OAuthFlowError::MalformedProfile("sub".into()))?
        .to_string();

    Ok(EntityData {
        subject,
        email: profile
            .get("email")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        email_verified: profile
            .get("email_verified")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        name: profile
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        avatar_url: profile
            .get("picture")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oidc_claims_map_onto_entity_data() {
        let data = oidc_entity_data(&json!({
            "sub": "10987654321",
            "email": "jo@example.com",
            "email_verified": true,
            "name": "Jo Example",
            "picture": "https://lh3.googleusercontent.com/a/photo",
        }))
        .unwrap();
        assert_eq!(data.subject, "10987654321");
        assert!(data.email_verified);
        assert_eq!(data.avatar_url.as_deref().unwrap(), "https://lh3.googleusercontent.com/a/photo");
    }

    #[test]
    fn missing_sub_is_malformed() {
        let err = oidc_entity_data(&json!({"email": "jo@example.com"})).unwrap_err();
        assert!(matches!(err, OAuthFlowError::MalformedProfile(_)));
    }

    #[test]
    fn unverified_email_defaults_false() {
        let data = oidc_entity_data(&json!({"sub": "1", "email": "jo@example.com"})).unwrap();
        assert!(!data.email_verified);
    }
}

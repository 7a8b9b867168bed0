//! Generic OIDC provider strategy.
//!
//! Configured entirely from endpoint URLs, for self-hosted identity
//! providers (Keycloak, Authentik, corporate SSO) that follow the standard
//! userinfo claim set.

use crate::config::ProviderConfig;
use crate::error::OAuthFlowError;
use crate::oauth::provider::{
    EntityData, OAuthProvider, ProviderTokens, get_profile, post_token_request,
};
use crate::oauth::providers::google::oidc_entity_data;
use async_trait::async_trait;

const DEFAULT_SCOPES: &str = "openid email profile";

#[derive(Debug)]
pub struct OidcProvider {
    name: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    authorize_url: String,
    token_url: String,
    profile_url: String,
    http: reqwest::Client,
}

impl OidcProvider {
    /// Build from config. The caller (registry) has already validated that
    /// the endpoint URLs are present.
    pub fn new(
        name: String,
        config: &ProviderConfig,
        redirect_uri: String,
        http: reqwest::Client,
    ) -> Result<Self, OAuthFlowError> {
        let endpoint = |field: &Option<String>, what: &str| {
            field
                .clone()
                .ok_or_else(|| OAuthFlowError::UnknownProvider(format!("{name}: missing {what}")))
        };
        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri,
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            authorize_url: endpoint(&config.authorize_url, "authorize_url")?,
            token_url: endpoint(&config.token_url, "token_url")?,
            profile_url: endpoint(&config.profile_url, "profile_url")?,
            http,
            name,
        })
    }
}

#[async_trait]
impl OAuthProvider for OidcProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorize_url(&self, state: &str, pkce_challenge: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.authorize_url,
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
        post_token_request(&self.http, &self.token_url, &params).await
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
    ) -> Result<serde_json::Value, OAuthFlowError> {
        get_profile(&self.http, &self.profile_url, access_token).await
    }

    fn entity_data(&self, profile: &serde_json::Value) -> Result<EntityData, OAuthFlowError> {
        oidc_entity_data(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(with_endpoints: bool) -> ProviderConfig {
        ProviderConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            scopes: None,
            authorize_url: with_endpoints.then(|| "https://sso.corp/authorize".into()),
            token_url: with_endpoints.then(|| "https://sso.corp/token".into()),
            profile_url: with_endpoints.then(|| "https://sso.corp/userinfo".into()),
        }
    }

    #[test]
    fn builds_from_complete_config() {
        let provider = OidcProvider::new(
            "corp-sso".into(),
            &config(true),
            "https://login.example.com/oauth/corp-sso/callback".into(),
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(provider.name(), "corp-sso");
        let url = provider.authorize_url("st", "ch");
        assert!(url.starts_with("https://sso.corp/authorize?"));
        assert!(url.contains("response_type=code"));
    }

    #[test]
    fn rejects_missing_endpoints() {
        let result = OidcProvider::new(
            "corp-sso".into(),
            &config(false),
            "https://login.example.com/oauth/corp-sso/callback".into(),
            reqwest::Client::new(),
        );
        assert!(result.is_err());
    }
}

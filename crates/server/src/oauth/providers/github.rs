//! GitHub OAuth provider strategy.

use crate::config::ProviderConfig;
use crate::error::OAuthFlowError;
use crate::oauth::provider::{
    EntityData, OAuthProvider, ProviderTokens, get_profile, post_token_request,
};
use async_trait::async_trait;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_BASE: &str = "https://api.github.com";
const DEFAULT_SCOPES: &str = "read:user user:email";

#[derive(Debug)]
pub struct GitHubProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    api_base: String,
    http: reqwest::Client,
}

/// One entry of the `/user/emails` response.
#[derive(Debug, Deserialize)]
struct EmailEntry {
    email: String,
    primary: bool,
    verified: bool,
}

impl GitHubProvider {
    pub fn new(config: &ProviderConfig, redirect_uri: String, http: reqwest::Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri,
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            api_base: API_BASE.to_string(),
            http,
        }
    }

    /// Point the provider at a different API host. Used by tests.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// GitHub hides the email on `/user` when the user marks it private;
    /// `/user/emails` still returns it with the `user:email` scope.
    async fn fetch_primary_email(
        &self,
        access_token: &str,
    ) -> Result<Option<(String, bool)>, OAuthFlowError> {
        let url = format!("{}/user/emails", self.api_base);
        let entries: Vec<EmailEntry> =
            serde_json::from_value(get_profile(&self.http, &url, access_token).await?)
                .map_err(|e| OAuthFlowError::ProfileFetch(format!("emails parse error: {e}")))?;

        Ok(entries
            .into_iter()
            .find(|e| e.primary)
            .map(|e| (e.email, e.verified)))
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
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
        let url = format!("{}/user", self.api_base);
        let mut profile = get_profile(&self.http, &url, access_token).await?;

        // Merge the primary email into the profile when it is private.
        if profile.get("email").is_none_or(serde_json::Value::is_null)
            && let Some((email, verified)) = self.fetch_primary_email(access_token).await?
            && let Some(obj) = profile.as_object_mut()
        {
            obj.insert("email".into(), serde_json::Value::String(email));
            obj.insert("email_verified".into(), serde_json::Value::Bool(verified));
        }

        Ok(profile)
    }

    fn entity_data(&self, profile: &serde_json::Value) -> Result<EntityData, OAuthFlowError> {
        let subject = profile
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| OAuthFlowError::MalformedProfile("id".into()))?
            .to_string();

        let email = profile
            .get("email")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        // GitHub REST profiles carry no verification flag; it is only
        // present when fetch_profile merged one in from /user/emails.
        let email_verified = profile
            .get("email_verified")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let name = profile
            .get("name")
            .and_then(serde_json::Value::as_str)
            .or_else(|| profile.get("login").and_then(serde_json::Value::as_str))
            .map(str::to_string);

        let avatar_url = profile
            .get("avatar_url")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        Ok(EntityData {
            subject,
            email,
            email_verified,
            name,
            avatar_url,
        })
    }
}

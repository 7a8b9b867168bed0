//! Provider registry.
//!
//! Builds the set of configured login strategies once at startup. Request
//! handlers only ever look providers up by name.

use crate::config::AppConfig;
use crate::error::OAuthFlowError;
use crate::oauth::provider::OAuthProvider;
use crate::oauth::providers::{GitHubProvider, GoogleProvider, OidcProvider};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    /// Build the registry from configuration. Unknown names become generic
    /// OIDC strategies; config validation has already checked that those
    /// carry explicit endpoint URLs.
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Result<Self, OAuthFlowError> {
        let mut providers: HashMap<String, Arc<dyn OAuthProvider>> = HashMap::new();

        for (name, provider_config) in &config.providers {
            let redirect_uri = config.redirect_uri(name);
            let provider: Arc<dyn OAuthProvider> = match name.as_str() {
                "github" => Arc::new(GitHubProvider::new(
                    provider_config,
                    redirect_uri,
                    http.clone(),
                )),
                "google" => Arc::new(GoogleProvider::new(
                    provider_config,
                    redirect_uri,
                    http.clone(),
                )),
                _ => Arc::new(OidcProvider::new(
                    name.clone(),
                    provider_config,
                    redirect_uri,
                    http.clone(),
                )?),
            };
            providers.insert(name.clone(), provider);
        }

        tracing::info!(
            providers = ?providers.keys().collect::<Vec<_>>(),
            "OAuth provider registry initialized"
        );
        Ok(Self { providers })
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OAuthProvider>, OAuthFlowError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| OAuthFlowError::UnknownProvider(name.to_string()))
    }

    /// Configured provider names, sorted for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, ProviderConfig};

    fn config() -> AppConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "github".to_string(),
            ProviderConfig {
                client_id: "id".into(),
                client_secret: "secret".into(),
                scopes: None,
                authorize_url: None,
                token_url: None,
                profile_url: None,
            },
        );
        AppConfig {
            database_url: "sqlite::memory:".into(),
            public_url: "https://login.example.com".into(),
            frontend_url: None,
            jwt: JwtConfig {
                secret: "0123456789abcdef0123456789abcdef".into(),
                token_lifetime_secs: 3600,
            },
            providers,
            listen_addr: "127.0.0.1:0".into(),
        }
    }

    #[test]
    fn registry_resolves_configured_provider() {
        let registry = ProviderRegistry::from_config(&config(), reqwest::Client::new()).unwrap();
        assert!(registry.get("github").is_ok());
        assert_eq!(registry.names(), vec!["github"]);
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let registry = ProviderRegistry::from_config(&config(), reqwest::Client::new()).unwrap();
        let err = registry.get("gitlab").unwrap_err();
        assert!(matches!(err, OAuthFlowError::UnknownProvider(_)));
    }
}

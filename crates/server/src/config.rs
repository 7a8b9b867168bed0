use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Settings for one OAuth provider.
///
/// The well-known providers ("github", "google") have built-in endpoint
/// URLs; any other provider name is treated as a generic OIDC provider and
/// must supply `authorize_url`, `token_url`, and `profile_url`.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Space-separated scope string. Defaults per provider when empty.
    #[serde(default)]
    pub scopes: Option<String>,
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret for issued access tokens.
    pub secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

fn default_token_lifetime() -> i64 {
    3600
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Public base URL of this service, used as the JWT issuer and to build
    /// provider redirect URIs (`{public_url}/oauth/{provider}/callback`).
    pub public_url: String,
    /// Frontend URL to redirect to after login. When absent the callback
    /// answers with JSON instead of redirecting.
    #[serde(default)]
    pub frontend_url: Option<String>,
    pub jwt: JwtConfig,
    /// Provider name -> provider settings.
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    /// Redirect URI registered with the provider for the given name.
    pub fn redirect_uri(&self, provider: &str) -> String {
        format!(
            "{}/oauth/{}/callback",
            self.public_url.trim_end_matches('/'),
            provider
        )
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variable override convention: any var matching the key path
/// separated by double underscores (e.g. `JWT__SECRET`,
/// `PROVIDERS__GITHUB__CLIENT_SECRET`) overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.jwt.secret.len() < 32 {
        return Err(ConfigError::Validation(
            "jwt.secret must be at least 32 characters".into(),
        ));
    }
    if app.jwt.token_lifetime_secs <= 0 {
        return Err(ConfigError::Validation(
            "jwt.token_lifetime_secs must be > 0".into(),
        ));
    }
    if !app.public_url.starts_with("http://") && !app.public_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "public_url must be an absolute http(s) URL".into(),
        ));
    }
    if app.providers.is_empty() {
        return Err(ConfigError::Validation(
            "at least one provider must be configured".into(),
        ));
    }
    for (name, provider) in &app.providers {
        if provider.client_id.is_empty() || provider.client_secret.is_empty() {
            return Err(ConfigError::Validation(format!(
                "provider '{name}' is missing client_id or client_secret"
            )));
        }
        // Custom providers need explicit endpoints; github/google are built in.
        if !matches!(name.as_str(), "github" | "google")
            && (provider.authorize_url.is_none()
                || provider.token_url.is_none()
                || provider.profile_url.is_none())
        {
            return Err(ConfigError::Validation(format!(
                "provider '{name}' must set authorize_url, token_url, and profile_url"
            )));
        }
    }
    Ok(())
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}

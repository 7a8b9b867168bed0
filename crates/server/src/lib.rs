//! An OAuth login service.
//!
//! Bridges third-party OAuth providers (GitHub, Google, generic OIDC) into
//! application sessions: it drives the authorization-code handshake,
//! normalizes the returned profile into entity data, resolves or creates
//! the application user, links the external identity, and issues a JWT
//! access token.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::oauth::{FlowStore, ProviderRegistry, TokenIssuer};

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth;

/// Shared application resources, attached to the router as state and as a
/// request extension for extractors.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub registry: ProviderRegistry,
    pub flows: FlowStore,
    pub tokens: TokenIssuer,
}

impl AppResources {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
    ) -> Result<Self, error::OAuthFlowError> {
        let http = reqwest::Client::new();
        let registry = ProviderRegistry::from_config(&config, http)?;
        let tokens = TokenIssuer::new(
            &config.jwt.secret,
            config.public_url.clone(),
            config.jwt.token_lifetime_secs,
        );
        Ok(Self {
            db,
            config,
            registry,
            flows: FlowStore::new(),
            tokens,
        })
    }
}

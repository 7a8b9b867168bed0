//! OAuth login subsystem.
//!
//! The handshake itself is standard authorization-code + PKCE driven over
//! HTTP against the configured providers; everything here is the glue
//! around it:
//!
//! - [`provider`] - the strategy trait and profile normalization types
//! - [`providers`] - concrete strategies (GitHub, Google, generic OIDC)
//! - [`registry`] - configured strategies by name
//! - [`flow`] - pending handshake state (CSRF state + PKCE verifier)
//! - [`identity`] - user lookup/creation and identity linking
//! - [`tokens`] - issued JWT access tokens

pub mod flow;
pub mod identity;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod tokens;

pub use flow::FlowStore;
pub use identity::IdentityService;
pub use provider::{EntityData, OAuthProvider, ProviderTokens};
pub use registry::ProviderRegistry;
pub use tokens::{AccessClaims, TokenIssuer};

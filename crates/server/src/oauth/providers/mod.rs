//! Concrete OAuth provider strategies.
//!
//! Each provider lives in its own module with its own struct and a
//! config-driven constructor. GitHub and Google carry built-in endpoint
//! URLs; `oidc` is a generic strategy configured entirely from endpoint
//! URLs for self-hosted identity providers.

pub mod github;
pub mod google;
pub mod oidc;

pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use oidc::OidcProvider;

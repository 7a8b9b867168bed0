use thiserror::Error;

/// Errors produced while driving an OAuth login handshake.
#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Login state is missing, expired, or already used")]
    InvalidState,
    #[error("Provider denied the authorization request: {0}")]
    AccessDenied(String),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),
    #[error("Provider profile is missing required field: {0}")]
    MalformedProfile(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Token signing failed: {0}")]
    TokenSigning(#[from] jsonwebtoken::errors::Error),
}

impl OAuthFlowError {
    /// Whether the error is attributable to the user or the provider
    /// interaction rather than this service. User errors are safe to
    /// surface in the login redirect; the rest get a generic message.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            OAuthFlowError::UnknownProvider(_)
                | OAuthFlowError::InvalidState
                | OAuthFlowError::AccessDenied(_)
        )
    }

    /// Stable machine-readable code for the frontend error redirect.
    pub fn code(&self) -> &'static str {
        match self {
            OAuthFlowError::UnknownProvider(_) => "unknown_provider",
            OAuthFlowError::InvalidState => "invalid_state",
            OAuthFlowError::AccessDenied(_) => "access_denied",
            OAuthFlowError::TokenExchange(_) => "token_exchange_failed",
            OAuthFlowError::ProfileFetch(_) => "profile_fetch_failed",
            OAuthFlowError::MalformedProfile(_) => "malformed_profile",
            OAuthFlowError::Database(_) => "server_error",
            OAuthFlowError::TokenSigning(_) => "server_error",
        }
    }
}

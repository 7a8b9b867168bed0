//! Authentication extractor for issued access tokens.
//!
//! Provides an Axum extractor that validates the Bearer JWT handed out at
//! the end of a login flow and resolves it to the user record.

use crate::AppResources;
use crate::entity::user;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated identity behind a Bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: user::Model,
}

/// Error type for authentication failures
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthError {
    /// Error code (e.g., "invalid_token", "not_found")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthError {
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_token".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self {
            error: "not_found".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self {
            error: "bad_request".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_string(),
            error_description: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "invalid_token" => StatusCode::UNAUTHORIZED,
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Axum extractor that validates issued JWT Bearer tokens.
///
/// # Example
///
/// ```ignore
/// async fn handler(JwtAuth(auth): JwtAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.user.id)
/// }
/// ```
pub struct JwtAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for JwtAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                AuthError::server_error()
            })?;

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        let token = match auth_header {
            Some(header) if header.starts_with("Bearer ") => &header[7..],
            Some(_) => {
                return Err(AuthError::invalid_token(
                    "Authorization header must use Bearer scheme",
                ));
            }
            None => {
                return Err(AuthError::invalid_token("Missing Authorization header"));
            }
        };

        let claims = resources
            .tokens
            .verify(token)
            .map_err(|e| AuthError::invalid_token(format!("Token validation failed: {e}")))?;

        let user = user::Entity::find_by_id(&claims.sub)
            .one(resources.db.as_ref())
            .await
            .map_err(|e| {
                tracing::error!("Database error looking up user: {}", e);
                AuthError::server_error()
            })?
            .ok_or_else(|| AuthError::invalid_token("User no longer exists"))?;

        Ok(JwtAuth(AuthenticatedUser { user }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_status_codes() {
        let response = AuthError::invalid_token("test").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::not_found("test").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AuthError::bad_request("test").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AuthError::server_error().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

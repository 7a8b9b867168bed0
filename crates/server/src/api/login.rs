//! OAuth login endpoints.
//!
//! The two-legged browser flow:
//! - `GET /oauth/{provider}` starts a handshake and redirects to the provider
//! - `GET /oauth/{provider}/callback` finishes it and hands back a JWT
//!
//! plus the account endpoints for an authenticated user (`/oauth/me`,
//! `/oauth/identities`, `DELETE /oauth/{provider}/link`).

use crate::AppResources;
use crate::api::auth::{AuthError, JwtAuth};
use crate::entity::{identity, user};
use crate::error::OAuthFlowError;
use crate::oauth::identity::IdentityService;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const LOGIN_TAG: &str = "OAuth Login";

/// Query parameters for starting a login.
#[derive(Debug, Deserialize)]
pub struct StartQuery {
    /// Relative frontend path to land on after login.
    pub return_to: Option<String>,
}

/// Query parameters the provider sends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the provider denied the request.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Response body for the callback when no frontend redirect is configured.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Public view of the authenticated user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

impl From<user::Model> for UserInfo {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
            name: user.name,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Public view of a linked provider identity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IdentityInfo {
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Whether the stored provider access token has expired; a fresh login
    /// through this provider refreshes it.
    pub token_expired: bool,
}

impl From<identity::Model> for IdentityInfo {
    fn from(link: identity::Model) -> Self {
        let token_expired = link.is_token_expired();
        Self {
            provider: link.provider,
            subject: link.subject,
            email: link.email,
            name: link.name,
            token_expired,
        }
    }
}

/// Creates the login router.
pub fn router() -> OpenApiRouter<AppResources> {
    OpenApiRouter::new()
        .routes(routes!(me))
        .routes(routes!(providers))
        .routes(routes!(identities))
        .routes(routes!(unlink))
        .routes(routes!(login_start))
        .routes(routes!(login_callback))
}

/// List the configured login providers.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/providers",
    tag = LOGIN_TAG,
    operation_id = "List Providers",
    summary = "List the provider names a login can be started with",
    responses(
        (status = 200, description = "Configured provider names, sorted", body = [String]),
    )
)]
async fn providers(State(resources): State<AppResources>) -> Json<Vec<String>> {
    Json(
        resources
            .registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    )
}

/// Start a login handshake with a provider.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/{provider}",
    tag = LOGIN_TAG,
    operation_id = "Start OAuth Login",
    summary = "Redirect the browser to the provider's authorization page",
    description = "Creates a pending login (state + PKCE verifier) and redirects to the provider. \
                   The handshake must complete within 10 minutes.",
    params(
        ("provider" = String, Path, description = "Configured provider name, e.g. `github`."),
        ("return_to" = Option<String>, Query, description = "Relative frontend path to land on after login."),
    ),
    responses(
        (status = 303, description = "Redirect to the provider's authorization URL"),
        (status = 404, description = "Unknown provider", body = AuthError),
    )
)]
async fn login_start(
    State(resources): State<AppResources>,
    Path(provider_name): Path<String>,
    Query(params): Query<StartQuery>,
) -> Response {
    let provider = match resources.registry.get(&provider_name) {
        Ok(p) => p,
        Err(err) => return flow_error_response(&resources, &err),
    };

    // Only relative paths are accepted, so a crafted link cannot bounce the
    // token to a foreign origin.
    let return_to = params
        .return_to
        .filter(|path| path.starts_with('/') && !path.starts_with("//"));

    let (state, pkce_challenge) = resources.flows.begin(&provider_name, return_to);
    let authorize_url = provider.authorize_url(&state, &pkce_challenge);

    tracing::info!(provider = %provider_name, "Starting OAuth login");
    Redirect::to(&authorize_url).into_response()
}

/// Complete a login handshake.
#[tracing::instrument(skip(resources, params))]
#[utoipa::path(
    get,
    path = "/{provider}/callback",
    tag = LOGIN_TAG,
    operation_id = "OAuth Login Callback",
    summary = "Provider redirect target completing the login",
    description = "Validates the state, exchanges the authorization code, fetches and normalizes the \
                   provider profile, resolves the application user, and issues a JWT access token.\n\n\
                   With a configured frontend URL the token is delivered in the redirect fragment; \
                   otherwise the response is JSON.",
    params(
        ("provider" = String, Path, description = "Configured provider name."),
        ("code" = Option<String>, Query, description = "Authorization code from the provider."),
        ("state" = Option<String>, Query, description = "State value from the matching login start."),
        ("error" = Option<String>, Query, description = "Provider error code, when the user denied access."),
        ("error_description" = Option<String>, Query, description = "Provider error detail."),
    ),
    responses(
        (status = 303, description = "Redirect to the frontend with the access token in the fragment"),
        (status = 200, description = "Access token (JSON mode)", body = LoginResponse),
        (status = 400, description = "Invalid state or denied authorization", body = AuthError),
    )
)]
async fn login_callback(
    State(resources): State<AppResources>,
    Path(provider_name): Path<String>,
    Query(params): Query<CallbackQuery>,
) -> Response {
    match run_callback(&resources, &provider_name, params).await {
        Ok(response) => response,
        Err(err) => flow_error_response(&resources, &err),
    }
}

async fn run_callback(
    resources: &AppResources,
    provider_name: &str,
    params: CallbackQuery,
) -> Result<Response, OAuthFlowError> {
    // Provider-reported errors short-circuit before any token exchange.
    if let Some(error) = params.error {
        let detail = params.error_description.unwrap_or(error);
        return Err(OAuthFlowError::AccessDenied(detail));
    }

    let state = params.state.ok_or(OAuthFlowError::InvalidState)?;
    let code = params
        .code
        .ok_or_else(|| OAuthFlowError::AccessDenied("missing authorization code".into()))?;

    let provider = resources.registry.get(provider_name)?;
    let pending = resources.flows.consume(provider_name, &state)?;

    let tokens = provider.exchange_code(&code, &pending.pkce_verifier).await?;
    let profile = provider.fetch_profile(&tokens.access_token).await?;
    let data = provider.entity_data(&profile)?;

    let service = IdentityService::new(resources.db.clone());
    let user = service.login(provider_name, &data, &tokens).await?;

    let access_token = resources.tokens.issue(&user)?;
    let expires_in = resources.tokens.lifetime_secs();

    match &resources.config.frontend_url {
        Some(frontend) => {
            // Fragment, not query: fragments never reach servers or logs.
            let mut url = format!(
                "{}/login#access_token={}&token_type=Bearer&expires_in={}",
                frontend.trim_end_matches('/'),
                urlencoding::encode(&access_token),
                expires_in,
            );
            if let Some(return_to) = &pending.return_to {
                url.push_str(&format!("&return_to={}", urlencoding::encode(return_to)));
            }
            Ok(Redirect::to(&url).into_response())
        }
        None => Ok(Json(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
        .into_response()),
    }
}

/// Map a flow error to the browser-facing response.
///
/// Mid-flow the browser is on our origin, so with a configured frontend the
/// user is sent back to its login page with an error code instead of being
/// stranded on a JSON error.
fn flow_error_response(resources: &AppResources, err: &OAuthFlowError) -> Response {
    if err.is_user_error() {
        tracing::info!(error = %err, "Login flow rejected");
    } else {
        tracing::error!(error = %err, "Login flow failed");
    }

    let description = if err.is_user_error() {
        err.to_string()
    } else {
        "Login failed. Please try again.".to_string()
    };

    if let Some(frontend) = &resources.config.frontend_url {
        let url = format!(
            "{}/login?error={}&error_description={}",
            frontend.trim_end_matches('/'),
            urlencoding::encode(err.code()),
            urlencoding::encode(&description),
        );
        return Redirect::to(&url).into_response();
    }

    let status = match err {
        OAuthFlowError::UnknownProvider(_) => StatusCode::NOT_FOUND,
        OAuthFlowError::InvalidState
        | OAuthFlowError::AccessDenied(_)
        | OAuthFlowError::MalformedProfile(_) => StatusCode::BAD_REQUEST,
        OAuthFlowError::TokenExchange(_) | OAuthFlowError::ProfileFetch(_) => {
            StatusCode::BAD_GATEWAY
        }
        OAuthFlowError::Database(_) | OAuthFlowError::TokenSigning(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(AuthError {
            error: err.code().to_string(),
            error_description: Some(description),
        }),
    )
        .into_response()
}

/// Return the authenticated user.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/me",
    tag = LOGIN_TAG,
    operation_id = "Get Current User",
    summary = "Return the user behind the Bearer token",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "The authenticated user", body = UserInfo),
        (status = 401, description = "Missing or invalid token", body = AuthError),
    )
)]
async fn me(JwtAuth(auth): JwtAuth) -> Json<UserInfo> {
    Json(auth.user.into())
}

/// List the provider identities linked to the authenticated user.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/identities",
    tag = LOGIN_TAG,
    operation_id = "List Linked Identities",
    summary = "List provider identities linked to the user",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Linked identities", body = [IdentityInfo]),
        (status = 401, description = "Missing or invalid token", body = AuthError),
    )
)]
async fn identities(
    State(resources): State<AppResources>,
    JwtAuth(auth): JwtAuth,
) -> Result<Json<Vec<IdentityInfo>>, AuthError> {
    let service = IdentityService::new(resources.db.clone());
    let links = service
        .identities_for_user(&auth.user.id)
        .await
        .map_err(|e| {
            tracing::error!("Database error listing identities: {}", e);
            AuthError::server_error()
        })?;
    Ok(Json(links.into_iter().map(IdentityInfo::from).collect()))
}

/// Unlink a provider identity from the authenticated user.
#[tracing::instrument(skip(resources, auth))]
#[utoipa::path(
    delete,
    path = "/{provider}/link",
    tag = LOGIN_TAG,
    operation_id = "Unlink Provider Identity",
    summary = "Remove the link between the user and a provider",
    security(("Authorization" = [])),
    params(
        ("provider" = String, Path, description = "Provider name to unlink."),
    ),
    responses(
        (status = 204, description = "Identity unlinked"),
        (status = 404, description = "No such link", body = AuthError),
        (status = 401, description = "Missing or invalid token", body = AuthError),
    )
)]
async fn unlink(
    State(resources): State<AppResources>,
    JwtAuth(auth): JwtAuth,
    Path(provider_name): Path<String>,
) -> Result<StatusCode, AuthError> {
    let service = IdentityService::new(resources.db.clone());
    let removed = service
        .unlink_identity(&auth.user.id, &provider_name)
        .await
        .map_err(|e| {
            tracing::error!("Database error unlinking identity: {}", e);
            AuthError::server_error()
        })?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::not_found(format!(
            "No linked identity for provider '{provider_name}'"
        )))
    }
}

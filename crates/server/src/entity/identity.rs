//! Identity entity - links users to external OAuth providers.
//!
//! Supports multiple providers per user (GitHub, Google, generic OIDC),
//! keyed by the provider name and the provider-side subject identifier.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "identity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Reference to user.id
    pub user_id: String,
    /// Provider name as configured (e.g. "github", "google", "corp-sso")
    pub provider: String,
    /// Provider-side user identifier (subject claim in OIDC)
    pub subject: String,
    /// Email reported by the provider (may differ from user.email)
    pub email: Option<String>,
    /// Display name reported by the provider
    pub name: Option<String>,
    /// Provider access token from the most recent login
    pub access_token: Option<String>,
    /// Provider refresh token, when the provider issues one
    pub refresh_token: Option<String>,
    /// When the provider access token expires
    pub token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Model {
    /// Check if the stored provider access token is expired.
    pub fn is_token_expired(&self) -> bool {
        self.token_expires_at
            .is_some_and(|exp| exp < OffsetDateTime::now_utc())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

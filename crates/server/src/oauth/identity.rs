//! Identity service: user lookup/creation and provider identity linking.
//!
//! This is the delegated user store of the login flow. Given normalized
//! entity data from a provider strategy it resolves the application user:
//!
//! 1. an identity row for (provider, subject) wins,
//! 2. else an existing user with the same email, but ONLY when the provider
//!    asserts the email is verified,
//! 3. else a new user is created from the entity data.
//!
//! ## Security: Email Verification Requirement
//!
//! Matching by email without provider-side verification would let an
//! attacker register a provider account with someone else's address and log
//! in as them. Unverified emails therefore always produce a fresh user.

use crate::entity::{identity, user};
use crate::error::OAuthFlowError;
use crate::oauth::provider::{EntityData, ProviderTokens};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use time::OffsetDateTime;

pub struct IdentityService {
    db: Arc<DatabaseConnection>,
}

impl IdentityService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the user owning the (provider, subject) identity, if any.
    #[tracing::instrument(skip(self))]
    pub async fn find_user_by_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<user::Model>, sea_orm::DbErr> {
        let identity = identity::Entity::find()
            .filter(identity::Column::Provider.eq(provider))
            .filter(identity::Column::Subject.eq(subject))
            .one(self.db.as_ref())
            .await?;

        match identity {
            Some(link) => {
                user::Entity::find_by_id(&link.user_id)
                    .one(self.db.as_ref())
                    .await
            }
            None => Ok(None),
        }
    }

    /// Resolve the user to log in for the given provider profile data,
    /// creating one when nothing matches.
    #[tracing::instrument(skip(self, data), fields(provider = provider, subject = %data.subject))]
    pub async fn resolve_user(
        &self,
        provider: &str,
        data: &EntityData,
    ) -> Result<user::Model, sea_orm::DbErr> {
        if let Some(user) = self.find_user_by_identity(provider, &data.subject).await? {
            return Ok(user);
        }

        let mut email_for_insert = data.email.clone();
        if let Some(email) = &data.email
            && let Some(user) = user::Entity::find()
                .filter(user::Column::Email.eq(email))
                .one(self.db.as_ref())
                .await?
        {
            // SECURITY: only match an existing account by email when the
            // provider asserts the address is verified.
            if data.email_verified {
                tracing::info!(user_id = %user.id, "Matched existing user by verified email");
                return Ok(user);
            }
            // The address belongs to someone else until the provider
            // verifies it; the fresh account gets no email.
            tracing::warn!("Unverified provider email collides with an existing account");
            email_for_insert = None;
        }

        let now = OffsetDateTime::now_utc();
        let created = user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(email_for_insert),
            email_verified: Set(data.email_verified && data.email.is_some()),
            name: Set(data.name.clone()),
            avatar_url: Set(data.avatar_url.clone()),
            created_at: Set(now),
            last_login_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::info!(user_id = %created.id, "Created new user from OAuth login");
        Ok(created)
    }

    /// Merge entity data into an existing user record and stamp the login.
    ///
    /// Fills fields the record is missing, never overwrites a value the
    /// user already has, and only ever flips `email_verified` to true.
    #[tracing::instrument(skip(self, user, data), fields(user_id = %user.id))]
    pub async fn merge_entity_data(
        &self,
        user: user::Model,
        data: &EntityData,
    ) -> Result<user::Model, sea_orm::DbErr> {
        let mut active: user::ActiveModel = user.clone().into();

        // Only a verified email may be attached after the fact, and only
        // when no other account already holds the address.
        if user.email.is_none()
            && data.email_verified
            && let Some(email) = &data.email
        {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::Id.ne(user.id.as_str()))
                .one(self.db.as_ref())
                .await?
                .is_some();
            if !taken {
                active.email = Set(Some(email.clone()));
                active.email_verified = Set(true);
            }
        } else if data.email_verified && !user.email_verified && user.email == data.email {
            active.email_verified = Set(true);
        }
        if user.name.is_none() && data.name.is_some() {
            active.name = Set(data.name.clone());
        }
        if user.avatar_url.is_none() && data.avatar_url.is_some() {
            active.avatar_url = Set(data.avatar_url.clone());
        }
        active.last_login_at = Set(Some(OffsetDateTime::now_utc()));

        active.update(self.db.as_ref()).await
    }

    /// Create or refresh the identity row linking a user to a provider
    /// account, storing the provider tokens from this login.
    #[tracing::instrument(skip(self, data, tokens), fields(provider = provider, subject = %data.subject))]
    pub async fn link_identity(
        &self,
        user_id: &str,
        provider: &str,
        data: &EntityData,
        tokens: &ProviderTokens,
    ) -> Result<identity::Model, sea_orm::DbErr> {
        let now = OffsetDateTime::now_utc();

        if let Some(existing) = identity::Entity::find()
            .filter(identity::Column::Provider.eq(provider))
            .filter(identity::Column::Subject.eq(&data.subject))
            .one(self.db.as_ref())
            .await?
        {
            let mut active: identity::ActiveModel = existing.into();
            active.access_token = Set(Some(tokens.access_token.clone()));
            active.refresh_token = Set(tokens.refresh_token.clone());
            active.token_expires_at = Set(tokens.expires_at);
            active.updated_at = Set(now);
            if let Some(email) = &data.email {
                active.email = Set(Some(email.clone()));
            }
            if let Some(name) = &data.name {
                active.name = Set(Some(name.clone()));
            }
            return active.update(self.db.as_ref()).await;
        }

        identity::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            provider: Set(provider.to_string()),
            subject: Set(data.subject.clone()),
            email: Set(data.email.clone()),
            name: Set(data.name.clone()),
            access_token: Set(Some(tokens.access_token.clone())),
            refresh_token: Set(tokens.refresh_token.clone()),
            token_expires_at: Set(tokens.expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
    }

    /// Complete a login: resolve the user, link the identity, merge profile
    /// fields, stamp last_login_at.
    #[tracing::instrument(skip(self, data, tokens), fields(provider = provider))]
    pub async fn login(
        &self,
        provider: &str,
        data: &EntityData,
        tokens: &ProviderTokens,
    ) -> Result<user::Model, OAuthFlowError> {
        let user = self.resolve_user(provider, data).await?;
        self.link_identity(&user.id, provider, data, tokens).await?;
        let user = self.merge_entity_data(user, data).await?;
        tracing::info!(user_id = %user.id, provider = provider, "User logged in");
        Ok(user)
    }

    /// All provider identities linked to a user.
    #[tracing::instrument(skip(self))]
    pub async fn identities_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<identity::Model>, sea_orm::DbErr> {
        identity::Entity::find()
            .filter(identity::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
    }

    /// Unlink a provider identity from a user. Returns whether a row was
    /// removed.
    #[tracing::instrument(skip(self))]
    pub async fn unlink_identity(
        &self,
        user_id: &str,
        provider: &str,
    ) -> Result<bool, sea_orm::DbErr> {
        let result = identity::Entity::delete_many()
            .filter(identity::Column::UserId.eq(user_id))
            .filter(identity::Column::Provider.eq(provider))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};

    async fn setup_test_db() -> Arc<DatabaseConnection> {
        let db = Database::connect("sqlite::memory:").await.expect("connect");

        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            r#"CREATE TABLE user (
                id TEXT PRIMARY KEY,
                email TEXT NULL UNIQUE,
                email_verified INTEGER NOT NULL DEFAULT 0,
                name TEXT NULL,
                avatar_url TEXT NULL,
                created_at TEXT NOT NULL,
                last_login_at TEXT NULL
            );"#,
        ))
        .await
        .expect("create user table");

        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            r#"CREATE TABLE identity (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                subject TEXT NOT NULL,
                email TEXT NULL,
                name TEXT NULL,
                access_token TEXT NULL,
                refresh_token TEXT NULL,
                token_expires_at TEXT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(provider, subject)
            );"#,
        ))
        .await
        .expect("create identity table");

        Arc::new(db)
    }

    fn entity_data(subject: &str, email: Option<&str>, verified: bool) -> EntityData {
        EntityData {
            subject: subject.to_string(),
            email: email.map(str::to_string),
            email_verified: verified,
            name: Some("Test User".into()),
            avatar_url: None,
        }
    }

    fn tokens() -> ProviderTokens {
        ProviderTokens {
            access_token: "provider-access".into(),
            refresh_token: Some("provider-refresh".into()),
            expires_at: None,
            scopes: None,
        }
    }

    #[tokio::test]
    async fn login_creates_user_and_identity() {
        let service = IdentityService::new(setup_test_db().await);

        let user = service
            .login("github", &entity_data("gh-1", Some("jo@example.com"), true), &tokens())
            .await
            .unwrap();

        assert_eq!(user.email.as_deref(), Some("jo@example.com"));
        assert!(user.email_verified);
        assert!(user.last_login_at.is_some());

        let identities = service.identities_for_user(&user.id).await.unwrap();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].provider, "github");
        assert_eq!(identities[0].subject, "gh-1");
        assert_eq!(identities[0].access_token.as_deref(), Some("provider-access"));
    }

    #[tokio::test]
    async fn repeat_login_reuses_user() {
        let service = IdentityService::new(setup_test_db().await);
        let data = entity_data("gh-1", Some("jo@example.com"), true);

        let first = service.login("github", &data, &tokens()).await.unwrap();
        let second = service.login("github", &data, &tokens()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(service.identities_for_user(&first.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn verified_email_links_second_provider_to_same_user() {
        let service = IdentityService::new(setup_test_db().await);

        let from_github = service
            .login("github", &entity_data("gh-1", Some("jo@example.com"), true), &tokens())
            .await
            .unwrap();
        let from_google = service
            .login("google", &entity_data("goog-9", Some("jo@example.com"), true), &tokens())
            .await
            .unwrap();

        assert_eq!(from_github.id, from_google.id);
        let identities = service.identities_for_user(&from_github.id).await.unwrap();
        assert_eq!(identities.len(), 2);
    }

    #[tokio::test]
    async fn unverified_email_never_matches_existing_account() {
        let service = IdentityService::new(setup_test_db().await);

        let victim = service
            .login("github", &entity_data("gh-1", Some("jo@example.com"), true), &tokens())
            .await
            .unwrap();
        // Attacker controls a provider account claiming the same address,
        // but the provider does not assert it is verified.
        let attacker = service
            .resolve_user("evil-sso", &entity_data("evil-1", Some("jo@example.com"), false))
            .await
            .unwrap();

        assert_ne!(victim.id, attacker.id);
        // The colliding address is not copied onto the attacker's account.
        assert!(attacker.email.is_none());
        assert!(!attacker.email_verified);
    }

    #[tokio::test]
    async fn unverified_unique_email_is_kept_on_new_account() {
        let service = IdentityService::new(setup_test_db().await);

        let user = service
            .resolve_user("github", &entity_data("gh-1", Some("jo@example.com"), false))
            .await
            .unwrap();
        assert_eq!(user.email.as_deref(), Some("jo@example.com"));
        assert!(!user.email_verified);
    }

    #[tokio::test]
    async fn merge_fills_missing_fields_only() {
        let service = IdentityService::new(setup_test_db().await);

        let user = service
            .resolve_user(
                "github",
                &EntityData {
                    subject: "gh-1".into(),
                    email: None,
                    email_verified: false,
                    name: None,
                    avatar_url: None,
                },
            )
            .await
            .unwrap();

        let merged = service
            .merge_entity_data(
                user,
                &EntityData {
                    subject: "gh-1".into(),
                    email: Some("jo@example.com".into()),
                    email_verified: true,
                    name: Some("Jo".into()),
                    avatar_url: Some("https://example.com/a.png".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(merged.email.as_deref(), Some("jo@example.com"));
        assert!(merged.email_verified);
        assert_eq!(merged.name.as_deref(), Some("Jo"));
        assert!(merged.last_login_at.is_some());

        // A later login with different values must not overwrite them.
        let remerged = service
            .merge_entity_data(
                merged.clone(),
                &EntityData {
                    subject: "gh-1".into(),
                    email: Some("other@example.com".into()),
                    email_verified: false,
                    name: Some("Someone Else".into()),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(remerged.email.as_deref(), Some("jo@example.com"));
        assert!(remerged.email_verified);
        assert_eq!(remerged.name.as_deref(), Some("Jo"));
    }

    #[tokio::test]
    async fn merge_does_not_steal_an_email_from_another_account() {
        let service = IdentityService::new(setup_test_db().await);

        // Account B owns the address.
        service
            .resolve_user("google", &entity_data("goog-1", Some("jo@example.com"), true))
            .await
            .unwrap();

        // Account A has no email and now presents the same verified address.
        let account_a = service
            .resolve_user(
                "github",
                &EntityData {
                    subject: "gh-1".into(),
                    email: None,
                    email_verified: false,
                    name: None,
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
        let merged = service
            .merge_entity_data(account_a, &entity_data("gh-1", Some("jo@example.com"), true))
            .await
            .unwrap();

        assert!(merged.email.is_none());
        assert!(!merged.email_verified);
    }

    #[tokio::test]
    async fn relogin_refreshes_provider_tokens() {
        let service = IdentityService::new(setup_test_db().await);
        let data = entity_data("gh-1", Some("jo@example.com"), true);

        let user = service.login("github", &data, &tokens()).await.unwrap();
        let fresh = ProviderTokens {
            access_token: "rotated".into(),
            refresh_token: None,
            expires_at: None,
            scopes: None,
        };
        service.login("github", &data, &fresh).await.unwrap();

        let identities = service.identities_for_user(&user.id).await.unwrap();
        assert_eq!(identities[0].access_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn unlink_removes_identity() {
        let service = IdentityService::new(setup_test_db().await);
        let user = service
            .login("github", &entity_data("gh-1", Some("jo@example.com"), true), &tokens())
            .await
            .unwrap();

        assert!(service.unlink_identity(&user.id, "github").await.unwrap());
        assert!(!service.unlink_identity(&user.id, "github").await.unwrap());
        assert!(service.identities_for_user(&user.id).await.unwrap().is_empty());
    }
}

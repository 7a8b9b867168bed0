//! Migration to add the login tables.
//!
//! Creates tables for:
//! - user: application user accounts created from OAuth logins
//! - identity: links between users and external OAuth providers

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(User::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(User::Email).string().null())
                    .col(
                        ColumnDef::new(User::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(User::Name).string().null())
                    .col(ColumnDef::new(User::AvatarUrl).string().null())
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(User::LastLoginAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Partial uniqueness is not portable across sqlite/postgres, so email
        // uniqueness for nullable emails is enforced by an index on the
        // column. NULLs are distinct in both backends.
        manager
            .create_index(
                Index::create()
                    .name("idx_user_email_unique")
                    .table(User::Table)
                    .col(User::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Identity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Identity::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Identity::UserId).string().not_null())
                    .col(ColumnDef::new(Identity::Provider).string().not_null())
                    .col(ColumnDef::new(Identity::Subject).string().not_null())
                    .col(ColumnDef::new(Identity::Email).string().null())
                    .col(ColumnDef::new(Identity::Name).string().null())
                    .col(ColumnDef::new(Identity::AccessToken).text().null())
                    .col(ColumnDef::new(Identity::RefreshToken).text().null())
                    .col(
                        ColumnDef::new(Identity::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Identity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Identity::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_user")
                            .from(Identity::Table, Identity::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // A provider account can be linked to exactly one user.
        manager
            .create_index(
                Index::create()
                    .name("idx_identity_provider_subject_unique")
                    .table(Identity::Table)
                    .col(Identity::Provider)
                    .col(Identity::Subject)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identity_user_id")
                    .table(Identity::Table)
                    .col(Identity::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Identity::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    Email,
    EmailVerified,
    Name,
    AvatarUrl,
    CreatedAt,
    LastLoginAt,
}

#[derive(DeriveIden)]
enum Identity {
    Table,
    Id,
    UserId,
    Provider,
    Subject,
    Email,
    Name,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
    CreatedAt,
    UpdatedAt,
}

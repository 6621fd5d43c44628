//! Consolidated initial schema migration

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Create users table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::ExternalAuthId, 255).not_null().unique_key())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(string_len_null(User::DisplayName, 255))
                    .col(boolean(User::IsActive).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(User::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(User::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_external_auth_id")
                    .table(User::Table)
                    .col(User::ExternalAuthId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Create workspaces table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Workspace::Table)
                    .if_not_exists()
                    .col(uuid(Workspace::Id).primary_key())
                    .col(
                        string_len(Workspace::Slug, 255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(string_len(Workspace::Name, 255).not_null())
                    .col(boolean(Workspace::RewardsEnabled).not_null().default(false))
                    .col(
                        timestamp_with_time_zone(Workspace::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Workspace::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workspaces_slug")
                    .table(Workspace::Table)
                    .col(Workspace::Slug)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Create memberships junction table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Membership::Table)
                    .if_not_exists()
                    .col(uuid(Membership::WorkspaceId).not_null())
                    .col(uuid(Membership::UserId).not_null())
                    .col(
                        string_len(Membership::Role, 32)
                            .not_null()
                            .default("participant"),
                    )
                    .col(boolean(Membership::IsPrimary).not_null().default(false))
                    .col(timestamp_with_time_zone_null(Membership::RemovedAt))
                    .col(
                        timestamp_with_time_zone(Membership::JoinedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(Membership::WorkspaceId)
                            .col(Membership::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memberships_workspace_id")
                            .from(Membership::Table, Membership::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memberships_user_id")
                            .from(Membership::Table, Membership::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_memberships_user_id")
                    .table(Membership::Table)
                    .col(Membership::UserId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 4. Create challenges table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Challenge::Table)
                    .if_not_exists()
                    .col(uuid(Challenge::Id).primary_key())
                    .col(uuid(Challenge::WorkspaceId).not_null())
                    .col(string_len(Challenge::Name, 255).not_null())
                    .col(
                        timestamp_with_time_zone(Challenge::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_challenges_workspace_id")
                            .from(Challenge::Table, Challenge::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_challenges_workspace_id")
                    .table(Challenge::Table)
                    .col(Challenge::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 5. Create enrollments junction table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Enrollment::Table)
                    .if_not_exists()
                    .col(uuid(Enrollment::ChallengeId).not_null())
                    .col(uuid(Enrollment::UserId).not_null())
                    .col(
                        timestamp_with_time_zone(Enrollment::EnrolledAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(Enrollment::ChallengeId)
                            .col(Enrollment::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_challenge_id")
                            .from(Enrollment::Table, Enrollment::ChallengeId)
                            .to(Challenge::Table, Challenge::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_user_id")
                            .from(Enrollment::Table, Enrollment::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 6. Create invite_codes table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(InviteCode::Table)
                    .if_not_exists()
                    .col(uuid(InviteCode::Id).primary_key())
                    .col(uuid(InviteCode::WorkspaceId).not_null())
                    .col(uuid_null(InviteCode::ChallengeId))
                    .col(string_len(InviteCode::Code, 64).not_null().unique_key())
                    .col(
                        string_len(InviteCode::Role, 32)
                            .not_null()
                            .default("participant"),
                    )
                    .col(timestamp_with_time_zone(InviteCode::ExpiresAt).not_null())
                    .col(integer(InviteCode::MaxUses).not_null().default(1))
                    .col(integer(InviteCode::UsedCount).not_null().default(0))
                    .col(uuid(InviteCode::CreatedBy).not_null())
                    .col(
                        timestamp_with_time_zone(InviteCode::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invite_codes_workspace_id")
                            .from(InviteCode::Table, InviteCode::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invite_codes_challenge_id")
                            .from(InviteCode::Table, InviteCode::ChallengeId)
                            .to(Challenge::Table, Challenge::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_invite_codes_code")
                    .table(InviteCode::Table)
                    .col(InviteCode::Code)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_invite_codes_workspace_id")
                    .table(InviteCode::Table)
                    .col(InviteCode::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 7. Create points_balances table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(PointsBalance::Table)
                    .if_not_exists()
                    .col(uuid(PointsBalance::WorkspaceId).not_null())
                    .col(uuid(PointsBalance::UserId).not_null())
                    .col(big_integer(PointsBalance::TotalPoints).not_null().default(0))
                    .col(
                        big_integer(PointsBalance::AvailablePoints)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        timestamp_with_time_zone(PointsBalance::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(PointsBalance::WorkspaceId)
                            .col(PointsBalance::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_points_balances_workspace_id")
                            .from(PointsBalance::Table, PointsBalance::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_points_balances_user_id")
                            .from(PointsBalance::Table, PointsBalance::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 8. Create reward_issuances table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(RewardIssuance::Table)
                    .if_not_exists()
                    .col(uuid(RewardIssuance::Id).primary_key())
                    .col(uuid(RewardIssuance::WorkspaceId).not_null())
                    .col(uuid(RewardIssuance::UserId).not_null())
                    .col(string_len(RewardIssuance::CatalogItem, 255).not_null())
                    .col(big_integer(RewardIssuance::Amount).not_null())
                    .col(
                        string_len(RewardIssuance::Status, 32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(string_len_null(RewardIssuance::ProviderTransactionId, 255))
                    .col(string_len_null(RewardIssuance::ProviderAdjustmentId, 255))
                    .col(text_null(RewardIssuance::FailureReason))
                    .col(
                        boolean(RewardIssuance::ShippingConfirmed)
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp_with_time_zone_null(RewardIssuance::ShippingConfirmedAt))
                    .col(
                        timestamp_with_time_zone(RewardIssuance::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(RewardIssuance::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reward_issuances_workspace_id")
                            .from(RewardIssuance::Table, RewardIssuance::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reward_issuances_user_id")
                            .from(RewardIssuance::Table, RewardIssuance::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Webhook correlation is by indexed id equality, never payload scans
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_reward_issuances_provider_transaction_id")
                    .table(RewardIssuance::Table)
                    .col(RewardIssuance::ProviderTransactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_reward_issuances_provider_adjustment_id")
                    .table(RewardIssuance::Table)
                    .col(RewardIssuance::ProviderAdjustmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_reward_issuances_workspace_status")
                    .table(RewardIssuance::Table)
                    .col(RewardIssuance::WorkspaceId)
                    .col(RewardIssuance::Status)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 9. Create webhook_events table (append-only)
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(WebhookEvent::Table)
                    .if_not_exists()
                    .col(uuid(WebhookEvent::Id).primary_key())
                    .col(uuid(WebhookEvent::WorkspaceId).not_null())
                    .col(string_len(WebhookEvent::EntityId, 255).not_null())
                    .col(string_len(WebhookEvent::Kind, 64).not_null())
                    .col(text(WebhookEvent::Payload).not_null())
                    .col(
                        timestamp_with_time_zone(WebhookEvent::ReceivedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_webhook_events_workspace_id")
                            .from(WebhookEvent::Table, WebhookEvent::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_webhook_events_entity_id")
                    .table(WebhookEvent::Table)
                    .col(WebhookEvent::EntityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order (respecting foreign keys)
        manager
            .drop_table(Table::drop().table(WebhookEvent::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(RewardIssuance::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(PointsBalance::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(InviteCode::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Enrollment::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Challenge::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Membership::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Workspace::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        Ok(())
    }
}

// ============================================================
// Table identifiers
// ============================================================

#[derive(DeriveIden)]
enum User {
    #[sea_orm(iden = "users")]
    Table,
    Id,
    ExternalAuthId,
    Email,
    DisplayName,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Workspace {
    #[sea_orm(iden = "workspaces")]
    Table,
    Id,
    Slug,
    Name,
    RewardsEnabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Membership {
    #[sea_orm(iden = "memberships")]
    Table,
    WorkspaceId,
    UserId,
    Role,
    IsPrimary,
    RemovedAt,
    JoinedAt,
}

#[derive(DeriveIden)]
enum Challenge {
    #[sea_orm(iden = "challenges")]
    Table,
    Id,
    WorkspaceId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Enrollment {
    #[sea_orm(iden = "enrollments")]
    Table,
    ChallengeId,
    UserId,
    EnrolledAt,
}

#[derive(DeriveIden)]
enum InviteCode {
    #[sea_orm(iden = "invite_codes")]
    Table,
    Id,
    WorkspaceId,
    ChallengeId,
    Code,
    Role,
    ExpiresAt,
    MaxUses,
    UsedCount,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PointsBalance {
    #[sea_orm(iden = "points_balances")]
    Table,
    WorkspaceId,
    UserId,
    TotalPoints,
    AvailablePoints,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RewardIssuance {
    #[sea_orm(iden = "reward_issuances")]
    Table,
    Id,
    WorkspaceId,
    UserId,
    CatalogItem,
    Amount,
    Status,
    ProviderTransactionId,
    ProviderAdjustmentId,
    FailureReason,
    ShippingConfirmed,
    ShippingConfirmedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WebhookEvent {
    #[sea_orm(iden = "webhook_events")]
    Table,
    Id,
    WorkspaceId,
    EntityId,
    Kind,
    Payload,
    ReceivedAt,
}

//! InviteCode entity: a capped, expiring token granting workspace membership

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::membership::WorkspaceRole;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invite_codes")]
pub struct Model {
    /// Invite code UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Workspace this code grants membership in
    pub workspace_id: Uuid,

    /// Challenge to enroll redeemers into (optional)
    pub challenge_id: Option<Uuid>,

    /// The code itself (unique, stored uppercase)
    #[sea_orm(unique)]
    pub code: String,

    /// Role granted on redemption
    pub role: WorkspaceRole,

    /// When the code stops being redeemable
    pub expires_at: ChronoDateTimeUtc,

    /// Maximum number of redemptions
    pub max_uses: i32,

    /// Redemptions consumed so far; never exceeds max_uses
    pub used_count: i32,

    /// Admin who created the code
    pub created_by: Uuid,

    /// When the code was created
    pub created_at: ChronoDateTimeUtc,
}

impl Model {
    /// Whether the code is past its expiry at the given instant
    pub fn is_expired(&self, now: ChronoDateTimeUtc) -> bool {
        now > self.expires_at
    }

    /// Whether every redemption slot has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_uses
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Invite code belongs to a workspace
    #[sea_orm(
        belongs_to = "super::workspace::Entity",
        from = "Column::WorkspaceId",
        to = "super::workspace::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Workspace,

    /// Invite code may target a challenge
    #[sea_orm(
        belongs_to = "super::challenge::Entity",
        from = "Column::ChallengeId",
        to = "super::challenge::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Challenge,
}

impl Related<super::workspace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workspace.def()
    }
}

impl Related<super::challenge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Challenge.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

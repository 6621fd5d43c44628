//! Membership entity: binds a user to a workspace with a role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user within a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum WorkspaceRole {
    /// Workspace administrator with full access
    #[sea_orm(string_value = "admin")]
    Admin,

    /// Manager with elevated permissions (approvals, member management)
    #[sea_orm(string_value = "manager")]
    Manager,

    /// Regular participant
    #[sea_orm(string_value = "participant")]
    Participant,
}

impl WorkspaceRole {
    /// Explicit privilege ranking: Admin > Manager > Participant.
    /// Comparison goes through this table, never through string ordering.
    pub fn rank(self) -> u8 {
        match self {
            WorkspaceRole::Admin => 3,
            WorkspaceRole::Manager => 2,
            WorkspaceRole::Participant => 1,
        }
    }

    /// Whether this role grants at least the privileges of `other`
    pub fn at_least(self, other: WorkspaceRole) -> bool {
        self.rank() >= other.rank()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    /// Workspace UUID (composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub workspace_id: Uuid,

    /// User UUID (composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,

    /// Role of the user in this workspace
    pub role: WorkspaceRole,

    /// Whether this is the user's primary workspace (at most one per user)
    pub is_primary: bool,

    /// Set when the member is offboarded; a removed membership grants no access
    pub removed_at: Option<ChronoDateTimeUtc>,

    /// When the user joined the workspace
    pub joined_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Membership belongs to a workspace
    #[sea_orm(
        belongs_to = "super::workspace::Entity",
        from = "Column::WorkspaceId",
        to = "super::workspace::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Workspace,

    /// Membership belongs to a user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::workspace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workspace.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

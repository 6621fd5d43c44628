//! Workspace entity: an isolated tenant

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workspaces")]
pub struct Model {
    /// Workspace UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Workspace slug (unique, URL-friendly, immutable)
    #[sea_orm(unique)]
    pub slug: String,

    /// Workspace name (human-readable)
    pub name: String,

    /// Whether the external reward provider integration is enabled
    pub rewards_enabled: bool,

    /// When the workspace was created
    pub created_at: ChronoDateTimeUtc,

    /// When the workspace was last updated
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Workspace has members
    #[sea_orm(has_many = "super::membership::Entity")]
    Members,

    /// Workspace runs challenges
    #[sea_orm(has_many = "super::challenge::Entity")]
    Challenges,

    /// Workspace owns invite codes
    #[sea_orm(has_many = "super::invite_code::Entity")]
    InviteCodes,

    /// Workspace tracks reward issuances
    #[sea_orm(has_many = "super::reward_issuance::Entity")]
    RewardIssuances,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::challenge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Challenges.def()
    }
}

impl Related<super::invite_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InviteCodes.def()
    }
}

impl Related<super::reward_issuance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RewardIssuances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! User entity: an authenticated principal

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// User UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Opaque identifier from the external identity provider (unique)
    #[sea_orm(unique)]
    pub external_auth_id: String,

    /// User email (unique)
    #[sea_orm(unique)]
    pub email: String,

    /// Display name (optional)
    pub display_name: Option<String>,

    /// Whether the account is active (accounts are deactivated, never deleted)
    pub is_active: bool,

    /// When the account was created
    pub created_at: ChronoDateTimeUtc,

    /// When the account was last updated
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// User is a member of workspaces
    #[sea_orm(has_many = "super::membership::Entity")]
    Memberships,

    /// User holds points balances
    #[sea_orm(has_many = "super::points_balance::Entity")]
    PointsBalances,

    /// User receives reward issuances
    #[sea_orm(has_many = "super::reward_issuance::Entity")]
    RewardIssuances,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::points_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointsBalances.def()
    }
}

impl Related<super::reward_issuance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RewardIssuances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! RewardIssuance entity: one attempt to grant a catalog reward
//!
//! Rows are a financial audit trail and are never deleted. The status
//! column is only ever moved by conditional updates so that concurrent
//! webhook delivery, sweeps and cancellations cannot double-apply a
//! terminal transition.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a reward issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum IssuanceStatus {
    /// Debited, order not yet confirmed with the provider
    #[sea_orm(string_value = "pending")]
    Pending,

    /// Provider accepted the order (terminal success)
    #[sea_orm(string_value = "issued")]
    Issued,

    /// Provider call failed; points refunded (terminal)
    #[sea_orm(string_value = "failed")]
    Failed,

    /// Cancelled by an admin; points refunded (terminal)
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl IssuanceStatus {
    /// Terminal states are never re-entered or left
    pub fn is_terminal(self) -> bool {
        !matches!(self, IssuanceStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reward_issuances")]
pub struct Model {
    /// Issuance UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Workspace the reward was redeemed in
    pub workspace_id: Uuid,

    /// User receiving the reward
    pub user_id: Uuid,

    /// Catalog item identifier at the provider
    pub catalog_item: String,

    /// Point cost debited for this issuance
    pub amount: i64,

    /// Current lifecycle state
    pub status: IssuanceStatus,

    /// Provider-side transaction id (set when the order is placed)
    #[sea_orm(indexed)]
    pub provider_transaction_id: Option<String>,

    /// Provider-side adjustment id (set by webhook reconciliation)
    #[sea_orm(indexed)]
    pub provider_adjustment_id: Option<String>,

    /// Why the issuance failed, when it did
    pub failure_reason: Option<String>,

    /// Whether the user confirmed delivery
    pub shipping_confirmed: bool,

    /// When delivery was confirmed
    pub shipping_confirmed_at: Option<ChronoDateTimeUtc>,

    /// When the issuance was initiated
    pub created_at: ChronoDateTimeUtc,

    /// When the issuance was last updated
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Issuance belongs to a workspace
    #[sea_orm(
        belongs_to = "super::workspace::Entity",
        from = "Column::WorkspaceId",
        to = "super::workspace::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Workspace,

    /// Issuance belongs to a user
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

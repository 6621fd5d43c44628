//! WebhookEvent entity: append-only log of provider notifications
//!
//! Events may arrive duplicated, out of order, or before the issuance
//! they correlate to exists. They are retained verbatim for audit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    /// Event UUID (primary key, assigned on receipt)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Workspace the event was delivered for
    pub workspace_id: Uuid,

    /// Provider-side entity id extracted from the payload
    #[sea_orm(indexed)]
    pub entity_id: String,

    /// Provider event type (e.g. "transaction.completed")
    pub kind: String,

    /// Raw payload as received
    #[sea_orm(column_type = "Text")]
    pub payload: String,

    /// When the event was received
    pub received_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Event was delivered for a workspace
    #[sea_orm(
        belongs_to = "super::workspace::Entity",
        from = "Column::WorkspaceId",
        to = "super::workspace::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Workspace,
}

impl Related<super::workspace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workspace.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

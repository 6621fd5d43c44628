//! Points Ledger
//!
//! One row per (user, workspace): lifetime `total_points` and spendable
//! `available_points`, with `available_points <= total_points` always.
//! Balance checks and mutations are single conditional updates, never
//! read-then-write pairs, so concurrent debits cannot both pass the check.

use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use questhub_db::entities::points_balance;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::CoreError;

/// Earned/available points accounting per user per workspace
#[derive(Clone)]
pub struct PointsLedger {
    db: DatabaseConnection,
    audit: Arc<dyn AuditSink>,
}

impl PointsLedger {
    pub fn new(db: DatabaseConnection, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, audit }
    }

    /// Return the balance row, creating a zeroed one on first access.
    ///
    /// Safe under concurrent first-access: the create is an upsert that
    /// ignores a lost insert race, not a check-then-insert.
    pub async fn get_or_create(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<points_balance::Model, CoreError> {
        points_balance::Entity::insert(points_balance::ActiveModel {
            workspace_id: Set(workspace_id),
            user_id: Set(user_id),
            total_points: Set(0),
            available_points: Set(0),
            updated_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([
                points_balance::Column::WorkspaceId,
                points_balance::Column::UserId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;

        points_balance::Entity::find_by_id((workspace_id, user_id))
            .one(&self.db)
            .await?
            .ok_or(CoreError::NotFound("points balance"))
    }

    /// Credit earned points: increments both totals atomically.
    /// Triggered by approved activity submissions.
    pub async fn credit(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        amount: i64,
    ) -> Result<points_balance::Model, CoreError> {
        require_positive(amount)?;

        // Ensure the row exists, then apply one atomic increment.
        self.get_or_create(user_id, workspace_id).await?;

        let res = points_balance::Entity::update_many()
            .col_expr(
                points_balance::Column::TotalPoints,
                Expr::col(points_balance::Column::TotalPoints).add(amount),
            )
            .col_expr(
                points_balance::Column::AvailablePoints,
                Expr::col(points_balance::Column::AvailablePoints).add(amount),
            )
            .col_expr(points_balance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(points_balance::Column::WorkspaceId.eq(workspace_id))
            .filter(points_balance::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            return Err(CoreError::NotFound("points balance"));
        }

        debug!(%user_id, %workspace_id, amount, "points credited");
        self.audit
            .record(AuditEvent::PointsCredited {
                workspace_id,
                user_id,
                amount,
            })
            .await;

        self.fetch(user_id, workspace_id).await
    }

    /// Debit spendable points. The balance check and the decrement are one
    /// conditional update; `total_points` is never reduced by spending.
    pub async fn debit(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        amount: i64,
    ) -> Result<points_balance::Model, CoreError> {
        require_positive(amount)?;

        let res = points_balance::Entity::update_many()
            .col_expr(
                points_balance::Column::AvailablePoints,
                Expr::col(points_balance::Column::AvailablePoints).sub(amount),
            )
            .col_expr(points_balance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(points_balance::Column::WorkspaceId.eq(workspace_id))
            .filter(points_balance::Column::UserId.eq(user_id))
            .filter(points_balance::Column::AvailablePoints.gte(amount))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            debug!(%user_id, %workspace_id, amount, "debit refused");
            return Err(CoreError::InsufficientBalance);
        }

        debug!(%user_id, %workspace_id, amount, "points debited");
        self.audit
            .record(AuditEvent::PointsDebited {
                workspace_id,
                user_id,
                amount,
            })
            .await;

        self.fetch(user_id, workspace_id).await
    }

    /// Re-credit `available_points` only, after a failed or cancelled
    /// reward issuance. Guarded so a stray refund can never push
    /// `available_points` past `total_points`.
    pub async fn refund(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
        amount: i64,
    ) -> Result<points_balance::Model, CoreError> {
        require_positive(amount)?;

        let res = points_balance::Entity::update_many()
            .col_expr(
                points_balance::Column::AvailablePoints,
                Expr::col(points_balance::Column::AvailablePoints).add(amount),
            )
            .col_expr(points_balance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(points_balance::Column::WorkspaceId.eq(workspace_id))
            .filter(points_balance::Column::UserId.eq(user_id))
            .filter(
                Expr::col(points_balance::Column::AvailablePoints)
                    .add(amount)
                    .lte(Expr::col(points_balance::Column::TotalPoints)),
            )
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            let existing = points_balance::Entity::find_by_id((workspace_id, user_id))
                .one(&self.db)
                .await?;
            return match existing {
                None => Err(CoreError::NotFound("points balance")),
                Some(_) => {
                    warn!(%user_id, %workspace_id, amount, "refund would exceed lifetime earnings");
                    Err(CoreError::InvalidInput(
                        "refund exceeds debited points".to_string(),
                    ))
                }
            };
        }

        debug!(%user_id, %workspace_id, amount, "points refunded");
        self.audit
            .record(AuditEvent::PointsRefunded {
                workspace_id,
                user_id,
                amount,
            })
            .await;

        self.fetch(user_id, workspace_id).await
    }

    async fn fetch(
        &self,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<points_balance::Model, CoreError> {
        points_balance::Entity::find_by_id((workspace_id, user_id))
            .one(&self.db)
            .await?
            .ok_or(CoreError::NotFound("points balance"))
    }
}

fn require_positive(amount: i64) -> Result<(), CoreError> {
    if amount <= 0 {
        return Err(CoreError::InvalidInput(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(matches!(
            require_positive(0),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            require_positive(-5),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(require_positive(1).is_ok());
    }
}

//! Reward Issuance State Machine
//!
//! PENDING -> ISSUED | FAILED | CANCELLED. The point debit and the
//! provider call are not atomic with each other: a crash between them
//! leaves the issuance PENDING, and the reconciliation sweep resolves it
//! later instead of silently losing the debited points. Every terminal
//! transition is a conditional update guarded on the prior status, so
//! the synchronous path, webhook reconciliation, the sweep and admin
//! cancellation can race without double-applying a refund.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use questhub_db::entities::membership::WorkspaceRole;
use questhub_db::entities::reward_issuance::{self, IssuanceStatus};
use questhub_db::entities::webhook_event;

use crate::audit::{AuditEvent, AuditSink};
use crate::authz::{Authorizer, Principal};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::ledger::PointsLedger;

/// A redeemable entry in the reward catalog
#[derive(Debug, Clone)]
pub struct CatalogItem {
    /// Item identifier at the provider
    pub sku: String,
    /// Point cost
    pub cost: i64,
}

/// Order placed with the external provider
#[derive(Debug, Clone)]
pub struct RewardOrder {
    /// Internal issuance id, passed as the provider-side reference
    pub issuance_id: Uuid,
    pub workspace_id: Uuid,
    pub user_email: String,
    pub sku: String,
}

/// Provider acknowledgement of a placed order
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub transaction_id: String,
}

/// Failure reported by the provider client
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// External reward-fulfillment provider
#[async_trait]
pub trait RewardProvider: Send + Sync {
    /// Place an order; returns the provider transaction id
    async fn place_order(&self, order: &RewardOrder) -> Result<OrderReceipt, ProviderError>;

    /// Look up an order by our issuance reference (used by the sweep)
    async fn lookup_order(&self, issuance_id: Uuid) -> Result<Option<OrderReceipt>, ProviderError>;
}

/// Provider event type, normalized from the payload's `type` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    TransactionCompleted,
    TransactionFailed,
    AdjustmentCreated,
    Other(String),
}

/// A provider webhook payload normalized for correlation
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    /// Provider-side entity id carried in the payload body
    pub entity_id: String,
    pub kind: ProviderEventKind,
    /// Parent transaction id, present on adjustment events
    pub related_transaction_id: Option<String>,
    /// Raw payload as received
    pub payload: Value,
}

impl ProviderEvent {
    /// Normalize a raw webhook payload.
    ///
    /// Expected shape: `{"type": "...", "data": {"id": "...", ...}}`,
    /// with `data.transaction_id` present on adjustment events.
    pub fn from_payload(payload: Value) -> Result<Self, CoreError> {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::InvalidInput("webhook payload missing 'type'".to_string()))?;
        let data = payload
            .get("data")
            .ok_or_else(|| CoreError::InvalidInput("webhook payload missing 'data'".to_string()))?;
        let entity_id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CoreError::InvalidInput("webhook payload missing 'data.id'".to_string())
            })?
            .to_string();
        let related_transaction_id = data
            .get("transaction_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let kind = match kind {
            "transaction.completed" => ProviderEventKind::TransactionCompleted,
            "transaction.failed" => ProviderEventKind::TransactionFailed,
            "adjustment.created" => ProviderEventKind::AdjustmentCreated,
            other => ProviderEventKind::Other(other.to_string()),
        };

        Ok(Self {
            entity_id,
            kind,
            related_transaction_id,
            payload,
        })
    }
}

/// What webhook reconciliation did with an event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookOutcome {
    /// Issuances whose correlation ids matched the event
    pub matched: usize,
    /// PENDING -> ISSUED transitions applied
    pub issued: usize,
    /// PENDING -> FAILED transitions applied (each refunded once)
    pub failed: usize,
    /// Adjustment ids recorded
    pub adjusted: usize,
}

/// Result of one stale-PENDING reconciliation sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub issued: usize,
    pub failed: usize,
    /// Provider lookups that errored; rows left PENDING for the next sweep
    pub skipped: usize,
}

/// Reward issuance lifecycle and webhook reconciliation
#[derive(Clone)]
pub struct RewardService {
    db: DatabaseConnection,
    authz: Authorizer,
    ledger: PointsLedger,
    provider: Arc<dyn RewardProvider>,
    audit: Arc<dyn AuditSink>,
    config: CoreConfig,
}

impl RewardService {
    pub fn new(
        db: DatabaseConnection,
        authz: Authorizer,
        ledger: PointsLedger,
        provider: Arc<dyn RewardProvider>,
        audit: Arc<dyn AuditSink>,
        config: CoreConfig,
    ) -> Self {
        Self {
            db,
            authz,
            ledger,
            provider,
            audit,
            config,
        }
    }

    /// Redeem points for a catalog reward.
    ///
    /// The debit happens first; the issuance row is never created when it
    /// fails. A provider failure transitions the row to FAILED and refunds
    /// the debit exactly once.
    pub async fn initiate(
        &self,
        principal: &Principal,
        slug: &str,
        item: &CatalogItem,
    ) -> Result<reward_issuance::Model, CoreError> {
        let (workspace, _) = self
            .authz
            .require_role(principal, slug, WorkspaceRole::Participant)
            .await?;

        if !workspace.rewards_enabled {
            return Err(CoreError::Forbidden(format!(
                "reward provider is not enabled for workspace '{}'",
                slug
            )));
        }
        if item.cost <= 0 {
            return Err(CoreError::InvalidInput(
                "catalog item cost must be positive".to_string(),
            ));
        }

        self.ledger
            .debit(principal.user_id, workspace.id, item.cost)
            .await?;

        let now = Utc::now();
        let issuance = reward_issuance::ActiveModel {
            id: Set(Uuid::new_v4()),
            workspace_id: Set(workspace.id),
            user_id: Set(principal.user_id),
            catalog_item: Set(item.sku.clone()),
            amount: Set(item.cost),
            status: Set(IssuanceStatus::Pending),
            provider_transaction_id: Set(None),
            provider_adjustment_id: Set(None),
            failure_reason: Set(None),
            shipping_confirmed: Set(false),
            shipping_confirmed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        let order = RewardOrder {
            issuance_id: issuance.id,
            workspace_id: workspace.id,
            user_email: principal.email.clone(),
            sku: item.sku.clone(),
        };

        match self.provider.place_order(&order).await {
            Ok(receipt) => {
                let applied = self
                    .finish_pending(
                        issuance.id,
                        IssuanceStatus::Issued,
                        Some(receipt.transaction_id),
                        None,
                    )
                    .await?;
                if !applied {
                    // A webhook or cancel got there first; the row already
                    // carries its terminal state.
                    warn!(issuance_id = %issuance.id, "issuance left pending state before order result landed");
                }
                info!(issuance_id = %issuance.id, workspace = %slug, "reward issued");
                self.audit
                    .record(AuditEvent::RewardIssued {
                        workspace_id: workspace.id,
                        user_id: principal.user_id,
                        issuance_id: issuance.id,
                    })
                    .await;
                self.fetch(issuance.id).await
            }
            Err(e) => {
                let applied = self
                    .finish_pending(
                        issuance.id,
                        IssuanceStatus::Failed,
                        None,
                        Some(e.to_string()),
                    )
                    .await?;
                if applied {
                    self.refund_issuance(&issuance).await;
                }
                self.audit
                    .record(AuditEvent::RewardFailed {
                        workspace_id: workspace.id,
                        user_id: principal.user_id,
                        issuance_id: issuance.id,
                    })
                    .await;
                Err(CoreError::ExternalProvider(e.to_string()))
            }
        }
    }

    /// Append a provider webhook event and drive any state transition it
    /// implies. Safe to run repeatedly on the same event and with events
    /// in any order: matching is by indexed id equality and transitions
    /// only ever leave PENDING.
    pub async fn reconcile_webhook(
        &self,
        workspace_id: Uuid,
        event: &ProviderEvent,
    ) -> Result<WebhookOutcome, CoreError> {
        webhook_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            workspace_id: Set(workspace_id),
            entity_id: Set(event.entity_id.clone()),
            kind: Set(kind_label(&event.kind)),
            payload: Set(event.payload.to_string()),
            received_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        // Correlate by id equality against the indexed columns only.
        let mut correlation = Condition::any()
            .add(reward_issuance::Column::ProviderTransactionId.eq(event.entity_id.clone()))
            .add(reward_issuance::Column::ProviderAdjustmentId.eq(event.entity_id.clone()));
        if let Some(related) = &event.related_transaction_id {
            correlation =
                correlation.add(reward_issuance::Column::ProviderTransactionId.eq(related.clone()));
        }

        let matches = reward_issuance::Entity::find()
            .filter(reward_issuance::Column::WorkspaceId.eq(workspace_id))
            .filter(correlation)
            .all(&self.db)
            .await?;

        let mut outcome = WebhookOutcome {
            matched: matches.len(),
            ..WebhookOutcome::default()
        };

        if matches.is_empty() {
            // May correlate to an issuance not yet created, or to noise.
            // Retained in the log for audit; never an error.
            debug!(entity_id = %event.entity_id, "webhook event matched no issuance");
            return Ok(outcome);
        }

        for issuance in matches {
            match event.kind {
                ProviderEventKind::TransactionCompleted => {
                    if self
                        .finish_pending(issuance.id, IssuanceStatus::Issued, None, None)
                        .await?
                    {
                        outcome.issued += 1;
                        self.audit
                            .record(AuditEvent::RewardIssued {
                                workspace_id,
                                user_id: issuance.user_id,
                                issuance_id: issuance.id,
                            })
                            .await;
                    }
                }
                ProviderEventKind::TransactionFailed => {
                    if self
                        .finish_pending(
                            issuance.id,
                            IssuanceStatus::Failed,
                            None,
                            Some("provider reported transaction failure".to_string()),
                        )
                        .await?
                    {
                        outcome.failed += 1;
                        self.refund_issuance(&issuance).await;
                        self.audit
                            .record(AuditEvent::RewardFailed {
                                workspace_id,
                                user_id: issuance.user_id,
                                issuance_id: issuance.id,
                            })
                            .await;
                    }
                }
                ProviderEventKind::AdjustmentCreated => {
                    let res = reward_issuance::Entity::update_many()
                        .col_expr(
                            reward_issuance::Column::ProviderAdjustmentId,
                            Expr::value(event.entity_id.clone()),
                        )
                        .col_expr(reward_issuance::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(reward_issuance::Column::Id.eq(issuance.id))
                        .filter(reward_issuance::Column::ProviderAdjustmentId.is_null())
                        .exec(&self.db)
                        .await?;
                    outcome.adjusted += res.rows_affected as usize;
                }
                ProviderEventKind::Other(_) => {
                    debug!(issuance_id = %issuance.id, "ignoring unrecognized webhook event kind");
                }
            }
        }

        Ok(outcome)
    }

    /// Confirm delivery of a reward. Owner-only and idempotent: a second
    /// confirmation returns success without re-timestamping.
    pub async fn confirm_shipping(
        &self,
        principal: &Principal,
        slug: &str,
        issuance_id: Uuid,
    ) -> Result<reward_issuance::Model, CoreError> {
        let (workspace, _) = self
            .authz
            .require_role(principal, slug, WorkspaceRole::Participant)
            .await?;

        let issuance = self.fetch(issuance_id).await?;

        if issuance.user_id != principal.user_id {
            return Err(CoreError::Forbidden(
                "only the reward's recipient may confirm delivery".to_string(),
            ));
        }
        if issuance.workspace_id != workspace.id {
            return Err(CoreError::WorkspaceMismatch);
        }
        if issuance.shipping_confirmed {
            return Ok(issuance);
        }

        reward_issuance::Entity::update_many()
            .col_expr(reward_issuance::Column::ShippingConfirmed, Expr::value(true))
            .col_expr(
                reward_issuance::Column::ShippingConfirmedAt,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(reward_issuance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reward_issuance::Column::Id.eq(issuance_id))
            .filter(reward_issuance::Column::ShippingConfirmed.eq(false))
            .exec(&self.db)
            .await?;

        // Raced confirmations both land here; the first timestamp wins.
        self.fetch(issuance_id).await
    }

    /// Cancel an issuance (admin action). Permitted only from PENDING or
    /// ISSUED-but-unfulfilled; refunds the debit exactly once.
    pub async fn cancel(
        &self,
        principal: &Principal,
        slug: &str,
        issuance_id: Uuid,
    ) -> Result<reward_issuance::Model, CoreError> {
        let (workspace, _) = self
            .authz
            .require_role(principal, slug, WorkspaceRole::Admin)
            .await?;

        let issuance = self.fetch(issuance_id).await?;
        if issuance.workspace_id != workspace.id {
            return Err(CoreError::WorkspaceMismatch);
        }

        let res = reward_issuance::Entity::update_many()
            .col_expr(
                reward_issuance::Column::Status,
                Expr::value(IssuanceStatus::Cancelled),
            )
            .col_expr(reward_issuance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reward_issuance::Column::Id.eq(issuance_id))
            .filter(
                reward_issuance::Column::Status
                    .is_in([IssuanceStatus::Pending, IssuanceStatus::Issued]),
            )
            .filter(reward_issuance::Column::ShippingConfirmed.eq(false))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            return Err(CoreError::Conflict(
                "issuance is not in a cancellable state".to_string(),
            ));
        }

        self.refund_issuance(&issuance).await;
        info!(issuance_id = %issuance_id, workspace = %slug, "reward issuance cancelled");
        self.audit
            .record(AuditEvent::RewardCancelled {
                workspace_id: workspace.id,
                issuance_id,
            })
            .await;

        self.fetch(issuance_id).await
    }

    /// Resolve PENDING issuances older than the configured staleness
    /// cutoff by re-querying the provider: a known order becomes ISSUED,
    /// an unknown one becomes FAILED with a refund. Lookup errors leave
    /// the row PENDING for the next sweep.
    pub async fn sweep_stale_pending(&self) -> Result<SweepReport, CoreError> {
        let cutoff = Utc::now() - self.config.pending_sweep_max_age;

        let stale = reward_issuance::Entity::find()
            .filter(reward_issuance::Column::Status.eq(IssuanceStatus::Pending))
            .filter(reward_issuance::Column::CreatedAt.lt(cutoff))
            .all(&self.db)
            .await?;

        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };

        for issuance in stale {
            match self.provider.lookup_order(issuance.id).await {
                Ok(Some(receipt)) => {
                    if self
                        .finish_pending(
                            issuance.id,
                            IssuanceStatus::Issued,
                            Some(receipt.transaction_id),
                            None,
                        )
                        .await?
                    {
                        report.issued += 1;
                        self.audit
                            .record(AuditEvent::RewardIssued {
                                workspace_id: issuance.workspace_id,
                                user_id: issuance.user_id,
                                issuance_id: issuance.id,
                            })
                            .await;
                    }
                }
                Ok(None) => {
                    if self
                        .finish_pending(
                            issuance.id,
                            IssuanceStatus::Failed,
                            None,
                            Some("order not found during reconciliation sweep".to_string()),
                        )
                        .await?
                    {
                        report.failed += 1;
                        self.refund_issuance(&issuance).await;
                        self.audit
                            .record(AuditEvent::RewardFailed {
                                workspace_id: issuance.workspace_id,
                                user_id: issuance.user_id,
                                issuance_id: issuance.id,
                            })
                            .await;
                    }
                }
                Err(e) => {
                    warn!(issuance_id = %issuance.id, "provider lookup failed during sweep: {}", e);
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    /// Move a PENDING issuance to a terminal state. Returns whether this
    /// call applied the transition; false means another path got there
    /// first, and the caller must not refund.
    async fn finish_pending(
        &self,
        issuance_id: Uuid,
        status: IssuanceStatus,
        transaction_id: Option<String>,
        failure_reason: Option<String>,
    ) -> Result<bool, CoreError> {
        let mut update = reward_issuance::Entity::update_many()
            .col_expr(reward_issuance::Column::Status, Expr::value(status))
            .col_expr(reward_issuance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(reward_issuance::Column::Id.eq(issuance_id))
            .filter(reward_issuance::Column::Status.eq(IssuanceStatus::Pending));

        if let Some(transaction_id) = transaction_id {
            update = update.col_expr(
                reward_issuance::Column::ProviderTransactionId,
                Expr::value(transaction_id),
            );
        }
        if let Some(reason) = failure_reason {
            update = update.col_expr(
                reward_issuance::Column::FailureReason,
                Expr::value(reason),
            );
        }

        let res = update.exec(&self.db).await?;
        Ok(res.rows_affected == 1)
    }

    /// Refund the debited points for an issuance whose terminal transition
    /// this caller just applied. A refund failure leaves an audit trail
    /// but does not mask the transition.
    async fn refund_issuance(&self, issuance: &reward_issuance::Model) {
        if let Err(e) = self
            .ledger
            .refund(issuance.user_id, issuance.workspace_id, issuance.amount)
            .await
        {
            warn!(
                issuance_id = %issuance.id,
                "failed to refund {} points: {}",
                issuance.amount,
                e
            );
        }
    }

    async fn fetch(&self, issuance_id: Uuid) -> Result<reward_issuance::Model, CoreError> {
        reward_issuance::Entity::find_by_id(issuance_id)
            .one(&self.db)
            .await?
            .ok_or(CoreError::NotFound("reward issuance"))
    }
}

fn kind_label(kind: &ProviderEventKind) -> String {
    match kind {
        ProviderEventKind::TransactionCompleted => "transaction.completed".to_string(),
        ProviderEventKind::TransactionFailed => "transaction.failed".to_string(),
        ProviderEventKind::AdjustmentCreated => "adjustment.created".to_string(),
        ProviderEventKind::Other(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_transaction_completed_payload() {
        let event = ProviderEvent::from_payload(json!({
            "type": "transaction.completed",
            "data": { "id": "txn_123" }
        }))
        .unwrap();
        assert_eq!(event.entity_id, "txn_123");
        assert_eq!(event.kind, ProviderEventKind::TransactionCompleted);
        assert!(event.related_transaction_id.is_none());
    }

    #[test]
    fn normalizes_adjustment_with_parent_transaction() {
        let event = ProviderEvent::from_payload(json!({
            "type": "adjustment.created",
            "data": { "id": "adj_9", "transaction_id": "txn_123" }
        }))
        .unwrap();
        assert_eq!(event.kind, ProviderEventKind::AdjustmentCreated);
        assert_eq!(event.related_transaction_id.as_deref(), Some("txn_123"));
    }

    #[test]
    fn unknown_event_types_are_preserved() {
        let event = ProviderEvent::from_payload(json!({
            "type": "catalog.updated",
            "data": { "id": "cat_1" }
        }))
        .unwrap();
        assert_eq!(
            event.kind,
            ProviderEventKind::Other("catalog.updated".to_string())
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(
            ProviderEvent::from_payload(json!({ "data": { "id": "x" } })),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            ProviderEvent::from_payload(json!({ "type": "transaction.completed" })),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            ProviderEvent::from_payload(json!({ "type": "transaction.completed", "data": {} })),
            Err(CoreError::InvalidInput(_))
        ));
    }
}

//! Fire-and-forget audit sink
//!
//! Sinks receive activity-log entries after the fact. They are not part
//! of correctness: a sink failure is logged and never propagated to the
//! operation that produced the event.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// An activity-log entry emitted by core operations
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    InviteRedeemed {
        workspace_id: Uuid,
        user_id: Uuid,
        code: String,
    },
    PointsCredited {
        workspace_id: Uuid,
        user_id: Uuid,
        amount: i64,
    },
    PointsDebited {
        workspace_id: Uuid,
        user_id: Uuid,
        amount: i64,
    },
    PointsRefunded {
        workspace_id: Uuid,
        user_id: Uuid,
        amount: i64,
    },
    RewardIssued {
        workspace_id: Uuid,
        user_id: Uuid,
        issuance_id: Uuid,
    },
    RewardFailed {
        workspace_id: Uuid,
        user_id: Uuid,
        issuance_id: Uuid,
    },
    RewardCancelled {
        workspace_id: Uuid,
        issuance_id: Uuid,
    },
}

/// Destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event; implementations swallow their own failures
    async fn record(&self, event: AuditEvent);
}

/// Default sink: structured log lines via tracing
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "questhub::audit", "{}", json),
            Err(e) => tracing::warn!("failed to serialize audit event: {}", e),
        }
    }
}

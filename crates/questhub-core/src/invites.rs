//! Invite Redemption Engine
//!
//! Redemption runs as one transaction. The slot consumption is a single
//! conditional update carrying both an expected-value guard on
//! `used_count` and the cap guard, so two concurrent redemptions can
//! never both take the last slot. A lost guard is retried once (re-read,
//! re-check) before surfacing a terminal error.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use questhub_db::entities::membership::{self, WorkspaceRole};
use questhub_db::entities::{challenge, enrollment, invite_code};

use crate::audit::{AuditEvent, AuditSink};
use crate::authz::{Authorizer, Principal};
use crate::config::CoreConfig;
use crate::error::CoreError;

/// Parameters for creating an invite code
#[derive(Debug, Clone)]
pub struct NewInviteCode {
    /// Role granted on redemption
    pub role: WorkspaceRole,
    /// When the code stops being redeemable
    pub expires_at: DateTime<Utc>,
    /// Maximum number of redemptions (>= 1)
    pub max_uses: i32,
    /// Challenge to enroll redeemers into (optional)
    pub challenge_id: Option<Uuid>,
    /// Explicit code string; generated when absent
    pub code: Option<String>,
}

/// Successful redemption outcome
#[derive(Debug, Clone)]
pub struct Redemption {
    pub workspace_id: Uuid,
    pub challenge_id: Option<Uuid>,
    pub membership: membership::Model,
    /// False when the caller was already a member (idempotent replay)
    pub newly_joined: bool,
}

/// Atomic, idempotent invite-code consumption
#[derive(Clone)]
pub struct InviteEngine {
    db: DatabaseConnection,
    authz: Authorizer,
    audit: Arc<dyn AuditSink>,
    config: CoreConfig,
}

impl InviteEngine {
    pub fn new(
        db: DatabaseConnection,
        authz: Authorizer,
        audit: Arc<dyn AuditSink>,
        config: CoreConfig,
    ) -> Self {
        Self {
            db,
            authz,
            audit,
            config,
        }
    }

    /// Create an invite code (admin action)
    pub async fn create_code(
        &self,
        principal: &Principal,
        slug: &str,
        params: NewInviteCode,
    ) -> Result<invite_code::Model, CoreError> {
        let (workspace, _) = self
            .authz
            .require_role(principal, slug, WorkspaceRole::Admin)
            .await?;

        if params.max_uses < 1 {
            return Err(CoreError::InvalidInput(
                "max_uses must be at least 1".to_string(),
            ));
        }
        let now = Utc::now();
        if params.expires_at <= now {
            return Err(CoreError::InvalidInput(
                "expiry must be in the future".to_string(),
            ));
        }

        if let Some(challenge_id) = params.challenge_id {
            let challenge = challenge::Entity::find_by_id(challenge_id)
                .one(&self.db)
                .await?
                .ok_or(CoreError::NotFound("challenge"))?;
            if challenge.workspace_id != workspace.id {
                return Err(CoreError::WorkspaceMismatch);
            }
        }

        let code = match params.code {
            Some(raw) => normalize_code(&raw)?,
            None => generate_code(),
        };

        let model = invite_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            workspace_id: Set(workspace.id),
            challenge_id: Set(params.challenge_id),
            code: Set(code),
            role: Set(params.role),
            expires_at: Set(params.expires_at),
            max_uses: Set(params.max_uses),
            used_count: Set(0),
            created_by: Set(principal.user_id),
            created_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        info!(workspace = %slug, code = %model.code, max_uses = model.max_uses, "invite code created");
        Ok(model)
    }

    /// Redeem an invite code for the calling principal.
    ///
    /// Idempotent: a caller who is already an active member gets the same
    /// successful result without consuming another slot.
    pub async fn redeem(
        &self,
        principal: &Principal,
        code: &str,
    ) -> Result<Redemption, CoreError> {
        let normalized = normalize_code(code)?;

        let txn = self.db.begin().await?;
        let outcome = self.redeem_in_txn(&txn, principal, &normalized).await;
        let redemption = match outcome {
            Ok(r) => {
                txn.commit().await?;
                r
            }
            Err(e) => {
                let _ = txn.rollback().await;
                return Err(e);
            }
        };

        if redemption.newly_joined {
            self.audit
                .record(AuditEvent::InviteRedeemed {
                    workspace_id: redemption.workspace_id,
                    user_id: principal.user_id,
                    code: normalized,
                })
                .await;
        }

        Ok(redemption)
    }

    async fn redeem_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        principal: &Principal,
        code: &str,
    ) -> Result<Redemption, CoreError> {
        let mut attempts = 0u32;

        loop {
            let invite = invite_code::Entity::find()
                .filter(invite_code::Column::Code.eq(code))
                .one(conn)
                .await?
                .ok_or(CoreError::NotFound("invite code"))?;

            let now = Utc::now();
            if invite.is_expired(now) {
                return Err(CoreError::Expired);
            }
            if invite.is_exhausted() {
                return Err(CoreError::Exhausted);
            }

            // Re-clicking a prior success must not consume another slot.
            let existing = membership::Entity::find_by_id((invite.workspace_id, principal.user_id))
                .one(conn)
                .await?;
            let restorable = match existing {
                Some(m) if m.removed_at.is_none() => {
                    if let Some(challenge_id) = invite.challenge_id {
                        ensure_enrollment(conn, challenge_id, principal.user_id).await?;
                    }
                    debug!(code = %code, user_id = %principal.user_id, "redemption replay, membership already exists");
                    return Ok(Redemption {
                        workspace_id: invite.workspace_id,
                        challenge_id: invite.challenge_id,
                        membership: m,
                        newly_joined: false,
                    });
                }
                other => other,
            };

            // One conditional update: expected-value guard on used_count
            // plus the cap guard. rows_affected == 0 means we lost a race.
            let res = invite_code::Entity::update_many()
                .col_expr(
                    invite_code::Column::UsedCount,
                    Expr::col(invite_code::Column::UsedCount).add(1),
                )
                .filter(invite_code::Column::Id.eq(invite.id))
                .filter(invite_code::Column::UsedCount.eq(invite.used_count))
                .filter(invite_code::Column::UsedCount.lt(invite.max_uses))
                .exec(conn)
                .await?;

            if res.rows_affected == 0 {
                if attempts >= self.config.cas_retry_limit {
                    let latest = invite_code::Entity::find_by_id(invite.id)
                        .one(conn)
                        .await?
                        .ok_or(CoreError::NotFound("invite code"))?;
                    if latest.is_exhausted() {
                        return Err(CoreError::Exhausted);
                    }
                    warn!(code = %code, "invite redemption lost conditional update after retries");
                    return Err(CoreError::Conflict(
                        "invite redemption raced with concurrent updates".to_string(),
                    ));
                }
                attempts += 1;
                continue;
            }

            let membership = match restorable {
                Some(removed) => {
                    let mut active: membership::ActiveModel = removed.into();
                    active.role = Set(invite.role);
                    active.removed_at = Set(None);
                    active.joined_at = Set(now);
                    active.update(conn).await?
                }
                None => {
                    membership::ActiveModel {
                        workspace_id: Set(invite.workspace_id),
                        user_id: Set(principal.user_id),
                        role: Set(invite.role),
                        is_primary: Set(false),
                        removed_at: Set(None),
                        joined_at: Set(now),
                    }
                    .insert(conn)
                    .await?
                }
            };

            if let Some(challenge_id) = invite.challenge_id {
                ensure_enrollment(conn, challenge_id, principal.user_id).await?;
            }

            info!(
                workspace_id = %invite.workspace_id,
                user_id = %principal.user_id,
                role = ?invite.role,
                "invite code redeemed"
            );

            return Ok(Redemption {
                workspace_id: invite.workspace_id,
                challenge_id: invite.challenge_id,
                membership,
                newly_joined: true,
            });
        }
    }
}

/// Create the enrollment if it does not exist yet
async fn ensure_enrollment<C: ConnectionTrait>(
    conn: &C,
    challenge_id: Uuid,
    user_id: Uuid,
) -> Result<(), CoreError> {
    enrollment::Entity::insert(enrollment::ActiveModel {
        challenge_id: Set(challenge_id),
        user_id: Set(user_id),
        enrolled_at: Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::columns([
            enrollment::Column::ChallengeId,
            enrollment::Column::UserId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    Ok(())
}

/// Codes are matched case-insensitively; the canonical form is uppercase
fn normalize_code(raw: &str) -> Result<String, CoreError> {
    let normalized = raw.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(CoreError::InvalidInput("empty invite code".to_string()));
    }
    Ok(normalized)
}

/// Generate a short, unambiguous code from a fresh UUID
fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_uppercase()
}

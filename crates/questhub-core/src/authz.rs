//! Authorization Resolver
//!
//! Resolves "does this principal have the right to act on this workspace,
//! and as what role". Every other component takes a workspace-scoped
//! action only after obtaining a role here with the caller's own
//! identity; this is the boundary that closes cross-tenant leakage.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use questhub_db::entities::membership::{self, WorkspaceRole};
use questhub_db::entities::workspace;

use crate::config::CoreConfig;
use crate::error::CoreError;

/// An authenticated identity, as supplied by the session provider
#[derive(Debug, Clone)]
pub struct Principal {
    /// Internal user id
    pub user_id: Uuid,
    /// Opaque id at the external identity provider
    pub external_auth_id: String,
    /// Verified email
    pub email: String,
}

/// Result of resolving a principal against a workspace slug
#[derive(Debug, Clone)]
pub struct RoleResolution {
    pub workspace: workspace::Model,
    /// `None` means the workspace exists but the principal has no access
    pub role: Option<WorkspaceRole>,
}

/// Resolves principal -> role-per-workspace and administers memberships
#[derive(Clone)]
pub struct Authorizer {
    db: DatabaseConnection,
    config: CoreConfig,
}

impl Authorizer {
    pub fn new(db: DatabaseConnection, config: CoreConfig) -> Self {
        Self { db, config }
    }

    /// Whether the principal is on the platform-superadmin allowlist.
    ///
    /// This is the only capability that crosses tenant boundaries. It is
    /// evaluated against static configuration, never against membership
    /// rows.
    pub fn is_superadmin(&self, principal: &Principal) -> bool {
        self.config.is_superadmin(principal.user_id)
    }

    /// Resolve the principal's effective role in the workspace named by `slug`.
    ///
    /// Fails with `NotFound` if the workspace does not exist. A missing or
    /// offboarded membership resolves to `role: None` rather than an error,
    /// so callers decide how to respond.
    pub async fn resolve_role(
        &self,
        principal: &Principal,
        slug: &str,
    ) -> Result<RoleResolution, CoreError> {
        let workspace = workspace::Entity::find()
            .filter(workspace::Column::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(CoreError::NotFound("workspace"))?;

        let membership = membership::Entity::find_by_id((workspace.id, principal.user_id))
            .one(&self.db)
            .await?;

        let role = membership
            .filter(|m| m.removed_at.is_none())
            .map(|m| m.role);

        debug!(
            user_id = %principal.user_id,
            workspace = %slug,
            role = ?role,
            "resolved workspace role"
        );

        Ok(RoleResolution { workspace, role })
    }

    /// Resolve and require a role of at least `min_role`, failing with
    /// `Forbidden` otherwise. Superadmins bypass membership entirely and
    /// act as admins in any existing workspace.
    pub async fn require_role(
        &self,
        principal: &Principal,
        slug: &str,
        min_role: WorkspaceRole,
    ) -> Result<(workspace::Model, WorkspaceRole), CoreError> {
        if self.is_superadmin(principal) {
            let workspace = workspace::Entity::find()
                .filter(workspace::Column::Slug.eq(slug))
                .one(&self.db)
                .await?
                .ok_or(CoreError::NotFound("workspace"))?;
            return Ok((workspace, WorkspaceRole::Admin));
        }

        let resolution = self.resolve_role(principal, slug).await?;
        match resolution.role {
            Some(role) if role.at_least(min_role) => Ok((resolution.workspace, role)),
            Some(_) | None => Err(CoreError::Forbidden(format!(
                "requires at least {:?} in workspace '{}'",
                min_role, slug
            ))),
        }
    }

    /// Add a member directly (admin action, as opposed to invite redemption).
    ///
    /// Restores a previously offboarded membership with the new role.
    pub async fn add_member(
        &self,
        principal: &Principal,
        slug: &str,
        target_user: Uuid,
        role: WorkspaceRole,
    ) -> Result<membership::Model, CoreError> {
        let (workspace, _) = self
            .require_role(principal, slug, WorkspaceRole::Admin)
            .await?;

        let existing = membership::Entity::find_by_id((workspace.id, target_user))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(m) if m.removed_at.is_none() => {
                return Err(CoreError::Conflict(format!(
                    "user is already a member of '{}'",
                    slug
                )));
            }
            Some(m) => {
                let mut active: membership::ActiveModel = m.into();
                active.role = Set(role);
                active.removed_at = Set(None);
                active.joined_at = Set(Utc::now());
                active.update(&self.db).await?
            }
            None => {
                let active = membership::ActiveModel {
                    workspace_id: Set(workspace.id),
                    user_id: Set(target_user),
                    role: Set(role),
                    is_primary: Set(false),
                    removed_at: Set(None),
                    joined_at: Set(Utc::now()),
                };
                active.insert(&self.db).await?
            }
        };

        info!(workspace = %slug, user_id = %target_user, role = ?role, "member added");
        Ok(model)
    }

    /// Change an existing member's role (admin action; idempotent on the same role)
    pub async fn change_role(
        &self,
        principal: &Principal,
        slug: &str,
        target_user: Uuid,
        role: WorkspaceRole,
    ) -> Result<membership::Model, CoreError> {
        let (workspace, _) = self
            .require_role(principal, slug, WorkspaceRole::Admin)
            .await?;

        let existing = membership::Entity::find_by_id((workspace.id, target_user))
            .one(&self.db)
            .await?
            .filter(|m| m.removed_at.is_none())
            .ok_or(CoreError::NotFound("membership"))?;

        if existing.role == role {
            return Ok(existing);
        }

        let mut active: membership::ActiveModel = existing.into();
        active.role = Set(role);
        let model = active.update(&self.db).await?;

        info!(workspace = %slug, user_id = %target_user, role = ?role, "member role changed");
        Ok(model)
    }

    /// Offboard a member (admin action). Soft state: the row is kept and
    /// stops granting access; nothing else is cascaded.
    pub async fn remove_member(
        &self,
        principal: &Principal,
        slug: &str,
        target_user: Uuid,
    ) -> Result<(), CoreError> {
        let (workspace, _) = self
            .require_role(principal, slug, WorkspaceRole::Admin)
            .await?;

        let existing = membership::Entity::find_by_id((workspace.id, target_user))
            .one(&self.db)
            .await?
            .filter(|m| m.removed_at.is_none())
            .ok_or(CoreError::NotFound("membership"))?;

        let mut active: membership::ActiveModel = existing.into();
        active.removed_at = Set(Some(Utc::now()));
        active.is_primary = Set(false);
        active.update(&self.db).await?;

        info!(workspace = %slug, user_id = %target_user, "member offboarded");
        Ok(())
    }

    /// Mark one of the caller's memberships as primary, clearing any other
    /// primary flag for the same user in the same transaction.
    pub async fn set_primary(
        &self,
        principal: &Principal,
        slug: &str,
    ) -> Result<membership::Model, CoreError> {
        let resolution = self.resolve_role(principal, slug).await?;
        if resolution.role.is_none() {
            return Err(CoreError::NotFound("membership"));
        }
        let workspace_id = resolution.workspace.id;

        let txn = self.db.begin().await?;

        membership::Entity::update_many()
            .col_expr(membership::Column::IsPrimary, Expr::value(false))
            .filter(membership::Column::UserId.eq(principal.user_id))
            .filter(membership::Column::IsPrimary.eq(true))
            .exec(&txn)
            .await?;

        membership::Entity::update_many()
            .col_expr(membership::Column::IsPrimary, Expr::value(true))
            .filter(membership::Column::WorkspaceId.eq(workspace_id))
            .filter(membership::Column::UserId.eq(principal.user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        membership::Entity::find_by_id((workspace_id, principal.user_id))
            .one(&self.db)
            .await?
            .ok_or(CoreError::NotFound("membership"))
    }
}

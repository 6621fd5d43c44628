//! Shared fixtures for questhub-core integration tests

use chrono::Utc;
use questhub_core::{Authorizer, CoreConfig, Principal, TracingAuditSink, WorkspaceRole};
use questhub_db::entities::{membership, user, workspace};
use questhub_db::{connect, migrate};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use uuid::Uuid;

pub async fn setup_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    migrate(&db).await.expect("Failed to run migrations");
    db
}

pub fn audit() -> Arc<TracingAuditSink> {
    Arc::new(TracingAuditSink)
}

pub fn authorizer(db: &DatabaseConnection) -> Authorizer {
    Authorizer::new(db.clone(), CoreConfig::default())
}

pub async fn create_user(db: &DatabaseConnection, email: &str) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        external_auth_id: Set(format!("auth|{}", email)),
        email: Set(email.to_string()),
        display_name: Set(None),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
}

pub async fn create_workspace(
    db: &DatabaseConnection,
    slug: &str,
    rewards_enabled: bool,
) -> workspace::Model {
    workspace::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slug.to_string()),
        name: Set(slug.to_string()),
        rewards_enabled: Set(rewards_enabled),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert workspace")
}

pub async fn add_membership(
    db: &DatabaseConnection,
    workspace: &workspace::Model,
    user: &user::Model,
    role: WorkspaceRole,
) -> membership::Model {
    membership::ActiveModel {
        workspace_id: Set(workspace.id),
        user_id: Set(user.id),
        role: Set(role),
        is_primary: Set(false),
        removed_at: Set(None),
        joined_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert membership")
}

pub fn principal(user: &user::Model) -> Principal {
    Principal {
        user_id: user.id,
        external_auth_id: user.external_auth_id.clone(),
        email: user.email.clone(),
    }
}

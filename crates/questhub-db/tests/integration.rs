//! Integration tests for questhub-db
//!
//! Tests entities and migrations with a real SQLite in-memory database

use chrono::{Duration, Utc};
use questhub_db::entities::membership::WorkspaceRole;
use questhub_db::entities::reward_issuance::{self, IssuanceStatus};
use questhub_db::entities::{invite_code, membership, user, workspace};
use questhub_db::{connect, migrate};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

/// Helper to create a test database
async fn setup_test_db() -> sea_orm::DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    db
}

async fn insert_user(db: &sea_orm::DatabaseConnection, email: &str) -> user::Model {
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

async fn insert_workspace(db: &sea_orm::DatabaseConnection, slug: &str) -> workspace::Model {
    workspace::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(slug.to_string()),
        name: Set(slug.to_string()),
        rewards_enabled: Set(false),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert workspace")
}

#[tokio::test]
async fn test_database_connection() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let result = migrate(&db).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_create_user_and_workspace() {
    let db = setup_test_db().await;

    let user = insert_user(&db, "alice@example.com").await;
    let workspace = insert_workspace(&db, "acme").await;

    assert_eq!(user.email, "alice@example.com");
    assert!(user.is_active);
    assert_eq!(workspace.slug, "acme");
    assert!(!workspace.rewards_enabled);
}

#[tokio::test]
async fn test_workspace_slug_is_unique() {
    let db = setup_test_db().await;

    insert_workspace(&db, "acme").await;

    let duplicate = workspace::ActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set("acme".to_string()),
        name: Set("Other Acme".to_string()),
        rewards_enabled: Set(false),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&db)
    .await;

    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_membership_composite_key() {
    let db = setup_test_db().await;

    let user = insert_user(&db, "bob@example.com").await;
    let workspace = insert_workspace(&db, "orbit").await;

    membership::ActiveModel {
        workspace_id: Set(workspace.id),
        user_id: Set(user.id),
        role: Set(WorkspaceRole::Manager),
        is_primary: Set(true),
        removed_at: Set(None),
        joined_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .expect("Failed to insert membership");

    let found = membership::Entity::find_by_id((workspace.id, user.id))
        .one(&db)
        .await
        .expect("Failed to query")
        .expect("Membership not found");

    assert_eq!(found.role, WorkspaceRole::Manager);
    assert!(found.is_primary);
    assert!(found.removed_at.is_none());

    // Same (workspace, user) pair cannot be inserted twice
    let duplicate = membership::ActiveModel {
        workspace_id: Set(workspace.id),
        user_id: Set(user.id),
        role: Set(WorkspaceRole::Participant),
        is_primary: Set(false),
        removed_at: Set(None),
        joined_at: Set(Utc::now()),
    }
    .insert(&db)
    .await;

    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_user_can_hold_roles_in_many_workspaces() {
    let db = setup_test_db().await;

    let user = insert_user(&db, "carol@example.com").await;
    let ws_a = insert_workspace(&db, "alpha").await;
    let ws_b = insert_workspace(&db, "beta").await;

    for (ws, role) in [
        (&ws_a, WorkspaceRole::Admin),
        (&ws_b, WorkspaceRole::Participant),
    ] {
        membership::ActiveModel {
            workspace_id: Set(ws.id),
            user_id: Set(user.id),
            role: Set(role),
            is_primary: Set(false),
            removed_at: Set(None),
            joined_at: Set(Utc::now()),
        }
        .insert(&db)
        .await
        .expect("Failed to insert membership");
    }

    let memberships = membership::Entity::find()
        .filter(membership::Column::UserId.eq(user.id))
        .all(&db)
        .await
        .expect("Failed to query");

    assert_eq!(memberships.len(), 2);
}

#[tokio::test]
async fn test_invite_code_is_unique() {
    let db = setup_test_db().await;

    let user = insert_user(&db, "dave@example.com").await;
    let workspace = insert_workspace(&db, "gamma").await;

    let code = invite_code::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(workspace.id),
        challenge_id: Set(None),
        code: Set("WELCOME1".to_string()),
        role: Set(WorkspaceRole::Participant),
        expires_at: Set(Utc::now() + Duration::days(7)),
        max_uses: Set(10),
        used_count: Set(0),
        created_by: Set(user.id),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .expect("Failed to insert invite code");

    assert!(!code.is_expired(Utc::now()));
    assert!(!code.is_exhausted());

    let duplicate = invite_code::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(workspace.id),
        challenge_id: Set(None),
        code: Set("WELCOME1".to_string()),
        role: Set(WorkspaceRole::Participant),
        expires_at: Set(Utc::now() + Duration::days(7)),
        max_uses: Set(1),
        used_count: Set(0),
        created_by: Set(user.id),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await;

    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_invite_code_expiry_and_exhaustion_helpers() {
    let db = setup_test_db().await;

    let user = insert_user(&db, "erin@example.com").await;
    let workspace = insert_workspace(&db, "delta").await;

    let code = invite_code::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(workspace.id),
        challenge_id: Set(None),
        code: Set("SPENT".to_string()),
        role: Set(WorkspaceRole::Participant),
        expires_at: Set(Utc::now() - Duration::hours(1)),
        max_uses: Set(2),
        used_count: Set(2),
        created_by: Set(user.id),
        created_at: Set(Utc::now() - Duration::days(1)),
    }
    .insert(&db)
    .await
    .expect("Failed to insert invite code");

    assert!(code.is_expired(Utc::now()));
    assert!(code.is_exhausted());
}

#[tokio::test]
async fn test_optional_columns_accept_null() {
    let db = setup_test_db().await;

    // display_name, removed_at and challenge_id are exercised as None by
    // the helpers above; a fresh issuance leaves every optional column
    // unset until the provider or the user fills it in.
    let user = insert_user(&db, "frank@example.com").await;
    let workspace = insert_workspace(&db, "epsilon").await;

    let issuance = reward_issuance::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(workspace.id),
        user_id: Set(user.id),
        catalog_item: Set("water-bottle".to_string()),
        amount: Set(25),
        status: Set(IssuanceStatus::Pending),
        provider_transaction_id: Set(None),
        provider_adjustment_id: Set(None),
        failure_reason: Set(None),
        shipping_confirmed: Set(false),
        shipping_confirmed_at: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .expect("Failed to insert pending issuance");

    let found = reward_issuance::Entity::find_by_id(issuance.id)
        .one(&db)
        .await
        .expect("Failed to query")
        .expect("Issuance not found");

    assert!(found.provider_transaction_id.is_none());
    assert!(found.provider_adjustment_id.is_none());
    assert!(found.failure_reason.is_none());
    assert!(found.shipping_confirmed_at.is_none());
    assert!(user.display_name.is_none());
}

#[tokio::test]
async fn test_concurrent_membership_inserts() {
    let db = setup_test_db().await;

    let workspace = insert_workspace(&db, "parallel").await;

    let mut user_ids = Vec::new();
    for i in 0..10 {
        let user = insert_user(&db, &format!("user{}@example.com", i)).await;
        user_ids.push(user.id);
    }

    let mut handles = vec![];

    for user_id in user_ids {
        let db_clone = db.clone();
        let workspace_id = workspace.id;
        let handle = tokio::spawn(async move {
            membership::ActiveModel {
                workspace_id: Set(workspace_id),
                user_id: Set(user_id),
                role: Set(WorkspaceRole::Participant),
                is_primary: Set(false),
                removed_at: Set(None),
                joined_at: Set(Utc::now()),
            }
            .insert(&db_clone)
            .await
        });

        handles.push(handle);
    }

    for handle in handles {
        let result = handle.await.expect("Task panicked");
        assert!(result.is_ok());
    }

    let count = membership::Entity::find()
        .filter(membership::Column::WorkspaceId.eq(workspace.id))
        .count(&db)
        .await
        .expect("Failed to count");

    assert_eq!(count, 10);
}

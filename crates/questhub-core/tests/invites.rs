//! Invite redemption engine integration tests

mod common;

use chrono::{Duration, Utc};
use common::*;
use questhub_core::invites::NewInviteCode;
use questhub_core::{CoreConfig, CoreError, InviteEngine, WorkspaceRole};
use questhub_db::entities::{challenge, enrollment, invite_code};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

fn engine(db: &DatabaseConnection) -> InviteEngine {
    InviteEngine::new(
        db.clone(),
        authorizer(db),
        audit(),
        CoreConfig::default(),
    )
}

fn new_code(role: WorkspaceRole, max_uses: i32) -> NewInviteCode {
    NewInviteCode {
        role,
        expires_at: Utc::now() + Duration::days(7),
        max_uses,
        challenge_id: None,
        code: None,
    }
}

/// Admin fixture: workspace plus an admin principal allowed to mint codes
async fn workspace_with_admin(
    db: &DatabaseConnection,
    slug: &str,
) -> (
    questhub_db::entities::workspace::Model,
    questhub_core::Principal,
) {
    let admin = create_user(db, &format!("admin@{}.example.com", slug)).await;
    let workspace = create_workspace(db, slug, false).await;
    add_membership(db, &workspace, &admin, WorkspaceRole::Admin).await;
    (workspace, principal(&admin))
}

#[tokio::test]
async fn create_code_validates_inputs() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (_, admin) = workspace_with_admin(&db, "acme").await;

    let err = engine
        .create_code(&admin, "acme", new_code(WorkspaceRole::Participant, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let mut expired = new_code(WorkspaceRole::Participant, 1);
    expired.expires_at = Utc::now() - Duration::hours(1);
    let err = engine.create_code(&admin, "acme", expired).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn create_code_rejects_challenge_from_another_workspace() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (_, admin) = workspace_with_admin(&db, "acme").await;
    let (other_ws, _) = workspace_with_admin(&db, "other").await;

    let foreign_challenge = challenge::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(other_ws.id),
        name: Set("Spring Steps".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .unwrap();

    let mut params = new_code(WorkspaceRole::Participant, 1);
    params.challenge_id = Some(foreign_challenge.id);

    let err = engine.create_code(&admin, "acme", params).await.unwrap_err();
    assert!(matches!(err, CoreError::WorkspaceMismatch));
}

#[tokio::test]
async fn redeem_grants_membership_with_code_role() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (workspace, admin) = workspace_with_admin(&db, "acme").await;

    let code = engine
        .create_code(&admin, "acme", new_code(WorkspaceRole::Manager, 5))
        .await
        .unwrap();

    let joiner = create_user(&db, "joiner@example.com").await;
    let redemption = engine
        .redeem(&principal(&joiner), &code.code)
        .await
        .unwrap();

    assert_eq!(redemption.workspace_id, workspace.id);
    assert!(redemption.newly_joined);
    assert_eq!(redemption.membership.role, WorkspaceRole::Manager);

    let refreshed = invite_code::Entity::find_by_id(code.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.used_count, 1);
}

#[tokio::test]
async fn redeem_is_case_insensitive() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (_, admin) = workspace_with_admin(&db, "acme").await;

    let mut params = new_code(WorkspaceRole::Participant, 1);
    params.code = Some("Welcome2026".to_string());
    let code = engine.create_code(&admin, "acme", params).await.unwrap();
    assert_eq!(code.code, "WELCOME2026");

    let joiner = create_user(&db, "joiner@example.com").await;
    let redemption = engine
        .redeem(&principal(&joiner), "  welcome2026 ")
        .await
        .unwrap();
    assert!(redemption.newly_joined);
}

#[tokio::test]
async fn redeem_unknown_code_is_not_found() {
    let db = setup_db().await;
    let engine = engine(&db);

    let joiner = create_user(&db, "joiner@example.com").await;
    let err = engine
        .redeem(&principal(&joiner), "NOPE")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound("invite code")));
}

#[tokio::test]
async fn redeem_expired_code_fails() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (workspace, admin) = workspace_with_admin(&db, "acme").await;

    invite_code::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(workspace.id),
        challenge_id: Set(None),
        code: Set("OLDCODE".to_string()),
        role: Set(WorkspaceRole::Participant),
        expires_at: Set(Utc::now() - Duration::hours(1)),
        max_uses: Set(10),
        used_count: Set(0),
        created_by: Set(admin.user_id),
        created_at: Set(Utc::now() - Duration::days(30)),
    }
    .insert(&db)
    .await
    .unwrap();

    let joiner = create_user(&db, "joiner@example.com").await;
    let err = engine
        .redeem(&principal(&joiner), "OLDCODE")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Expired));
}

#[tokio::test]
async fn redeem_exhausted_code_fails() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (_, admin) = workspace_with_admin(&db, "acme").await;

    let code = engine
        .create_code(&admin, "acme", new_code(WorkspaceRole::Participant, 1))
        .await
        .unwrap();

    let first = create_user(&db, "first@example.com").await;
    engine.redeem(&principal(&first), &code.code).await.unwrap();

    let second = create_user(&db, "second@example.com").await;
    let err = engine
        .redeem(&principal(&second), &code.code)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Exhausted));
}

#[tokio::test]
async fn redeem_is_idempotent_for_the_same_user() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (workspace, admin) = workspace_with_admin(&db, "acme").await;

    let code = engine
        .create_code(&admin, "acme", new_code(WorkspaceRole::Participant, 3))
        .await
        .unwrap();

    let joiner = create_user(&db, "joiner@example.com").await;
    let p = principal(&joiner);

    let first = engine.redeem(&p, &code.code).await.unwrap();
    let second = engine.redeem(&p, &code.code).await.unwrap();

    assert_eq!(first.workspace_id, workspace.id);
    assert_eq!(second.workspace_id, workspace.id);
    assert!(first.newly_joined);
    assert!(!second.newly_joined);

    // The replay consumed no extra slot
    let refreshed = invite_code::Entity::find_by_id(code.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.used_count, 1);
}

#[tokio::test]
async fn concurrent_redemptions_never_exceed_the_cap() {
    let db = setup_db().await;
    let (_, admin) = workspace_with_admin(&db, "acme").await;

    let code = engine(&db)
        .create_code(&admin, "acme", new_code(WorkspaceRole::Participant, 1))
        .await
        .unwrap();

    let user_a = create_user(&db, "a@example.com").await;
    let user_b = create_user(&db, "b@example.com").await;

    let mut handles = vec![];
    for user in [user_a, user_b] {
        let engine = engine(&db);
        let code = code.code.clone();
        let p = principal(&user);
        handles.push(tokio::spawn(async move { engine.redeem(&p, &code).await }));
    }

    let mut successes = 0;
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => successes += 1,
            Err(CoreError::Exhausted) => exhausted += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(exhausted, 1);

    let refreshed = invite_code::Entity::find_by_id(code.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.used_count, refreshed.max_uses);
}

#[tokio::test]
async fn challenge_scoped_code_enrolls_the_redeemer() {
    let db = setup_db().await;
    let engine = engine(&db);
    let (workspace, admin) = workspace_with_admin(&db, "acme").await;

    let challenge = challenge::ActiveModel {
        id: Set(Uuid::new_v4()),
        workspace_id: Set(workspace.id),
        name: Set("Spring Steps".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .unwrap();

    let mut params = new_code(WorkspaceRole::Participant, 5);
    params.challenge_id = Some(challenge.id);
    let code = engine.create_code(&admin, "acme", params).await.unwrap();

    let joiner = create_user(&db, "joiner@example.com").await;
    let p = principal(&joiner);

    let redemption = engine.redeem(&p, &code.code).await.unwrap();
    assert_eq!(redemption.challenge_id, Some(challenge.id));

    // Replay reuses the enrollment instead of duplicating it
    engine.redeem(&p, &code.code).await.unwrap();

    let enrollments = enrollment::Entity::find()
        .filter(enrollment::Column::ChallengeId.eq(challenge.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(enrollments.len(), 1);
}

#[tokio::test]
async fn redeem_after_offboarding_restores_membership_with_a_new_slot() {
    let db = setup_db().await;
    let engine = engine(&db);
    let authz = authorizer(&db);
    let (_, admin) = workspace_with_admin(&db, "acme").await;

    let code = engine
        .create_code(&admin, "acme", new_code(WorkspaceRole::Participant, 5))
        .await
        .unwrap();

    let joiner = create_user(&db, "joiner@example.com").await;
    let p = principal(&joiner);

    engine.redeem(&p, &code.code).await.unwrap();
    authz
        .remove_member(&admin, "acme", joiner.id)
        .await
        .unwrap();

    let redemption = engine.redeem(&p, &code.code).await.unwrap();
    assert!(redemption.newly_joined);
    assert!(redemption.membership.removed_at.is_none());

    let refreshed = invite_code::Entity::find_by_id(code.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.used_count, 2);
}

//! Integration tests for the Group repository using in-memory SurrealDB.

use accord_core::error::AccordError;
use accord_core::keys::encode_key;
use accord_core::models::grant::AccessType;
use accord_core::models::group::PUBLIC_GROUP_NAME;
use accord_core::models::user::CreateUser;
use accord_core::repository::{
    AuthorizationChecker, GroupRepository, Principal, UserRepository,
};
use accord_db::repository::{
    SurrealAuthorizationChecker, SurrealGroupRepository, SurrealUserRepository,
};
use accord_db::{DbConfig, DbManager};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use uuid::Uuid;

/// Helper: open the embedded engine, migrated and ready.
async fn setup() -> Surreal<Db> {
    let manager = DbManager::embedded(&DbConfig::memory()).await.unwrap();
    manager.client().clone()
}

async fn create_user(db: &Surreal<Db>, username: &str) -> Uuid {
    let repo = SurrealUserRepository::new(db.clone());
    repo.create(CreateUser {
        username: username.into(),
    })
    .await
    .unwrap()
    .id
}

/// Helper: join a user to a group directly, bypassing authorization.
/// Stands in for an administrative enrollment step.
async fn join_group(db: &Surreal<Db>, user_id: Uuid, group_id: Uuid) {
    db.query(
        "RELATE (type::record('user', $user_id)) -> member_of -> \
         (type::record('group', $group_id))",
    )
    .bind(("user_id", user_id.to_string()))
    .bind(("group_id", group_id.to_string()))
    .await
    .unwrap()
    .check()
    .unwrap();
}

#[tokio::test]
async fn public_group_is_created_once() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let first = repo.get_or_create_public_group().await.unwrap();
    assert_eq!(first.name, PUBLIC_GROUP_NAME);
    assert!(first.is_system_group);
    assert!(!first.is_individual);
    assert!(first.creatable_types.contains(&"user".to_string()));

    let second = repo.get_or_create_public_group().await.unwrap();
    assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn public_group_bootstrap_self_grants() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());
    let checker = SurrealAuthorizationChecker::new(db.clone());

    let public = repo.get_or_create_public_group().await.unwrap();
    let member = create_user(&db, "alice").await;
    join_group(&db, member, public.id).await;

    // Membership confers all three bootstrap permissions on the
    // group's own resource key.
    let key = encode_key(public.id);
    let principal = Principal::User(member);
    for access in AccessType::ALL {
        assert!(checker.has_access(&principal, &key, access).await.unwrap());
    }
}

#[tokio::test]
async fn concurrent_bootstrap_yields_single_public_group() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    // Both callers may pass the lookup before either creates; the
    // unique index turns the loser's insert into a re-read of the
    // winner's row.
    let (first, second) = tokio::join!(
        repo.get_or_create_public_group(),
        repo.get_or_create_public_group()
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.id, second.id);

    let mut result = db
        .query("SELECT VALUE meta::id(id) FROM group WHERE name = $name")
        .bind(("name", PUBLIC_GROUP_NAME))
        .await
        .unwrap();
    let ids: Vec<String> = result.take(0).unwrap();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn individual_group_requires_existing_user() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let err = repo.get_or_create_individual_group("ghost").await.unwrap_err();
    assert!(matches!(err, AccordError::NotFound { .. }));
}

#[tokio::test]
async fn individual_group_bootstrap() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());
    let checker = SurrealAuthorizationChecker::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let group = repo.get_or_create_individual_group("alice").await.unwrap();

    assert_eq!(group.name, "alice");
    assert!(group.is_system_group);
    assert!(group.is_individual);

    // Alice was enrolled as the founding member and can administer
    // her own group.
    let principal = Principal::User(alice);
    let key = encode_key(group.id);
    assert!(
        checker
            .has_access(&principal, &key, AccessType::Change)
            .await
            .unwrap()
    );

    let members = repo.get_users(&principal, group.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, alice);
    assert_eq!(members[0].username, "alice");
}

#[tokio::test]
async fn individual_group_is_idempotent() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    create_user(&db, "alice").await;
    let first = repo.get_or_create_individual_group("alice").await.unwrap();
    let second = repo.get_or_create_individual_group("alice").await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn add_user_requires_change_access() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let group = repo.get_or_create_individual_group("alice").await.unwrap();

    // Bob holds no CHANGE grant on Alice's group.
    let err = repo
        .add_user(&Principal::User(bob), group.id, bob)
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::Unauthorized { .. }));

    // The failed attempt left membership untouched.
    let members = repo
        .get_users(&Principal::User(alice), group.id)
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn add_and_remove_member() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let group = repo.get_or_create_individual_group("alice").await.unwrap();
    let principal = Principal::User(alice);

    repo.add_user(&principal, group.id, bob).await.unwrap();
    let members = repo.get_users(&principal, group.id).await.unwrap();
    assert_eq!(members.len(), 2);

    // Membership is a set: re-adding changes nothing.
    repo.add_user(&principal, group.id, bob).await.unwrap();
    let members = repo.get_users(&principal, group.id).await.unwrap();
    assert_eq!(members.len(), 2);

    repo.remove_user(&principal, group.id, bob).await.unwrap();
    let members = repo.get_users(&principal, group.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, alice);
}

#[tokio::test]
async fn add_user_to_missing_group_is_not_found() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let err = repo
        .add_user(&Principal::User(alice), Uuid::new_v4(), alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::NotFound { entity, .. } if entity == "group"));
}

#[tokio::test]
async fn add_missing_user_is_not_found() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let group = repo.get_or_create_individual_group("alice").await.unwrap();

    let err = repo
        .add_user(&Principal::User(alice), group.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::NotFound { entity, .. } if entity == "user"));
}

#[tokio::test]
async fn anonymous_principal_is_rejected() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    let alice = create_user(&db, "alice").await;
    let group = repo.get_or_create_individual_group("alice").await.unwrap();

    let err = repo
        .add_user(&Principal::Anonymous, group.id, alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::Unauthorized { .. }));

    let err = repo
        .get_users(&Principal::Anonymous, group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::Unauthorized { .. }));
}

#[tokio::test]
async fn get_users_requires_read_access() {
    let db = setup().await;
    let repo = SurrealGroupRepository::new(db.clone());

    create_user(&db, "alice").await;
    let bob = create_user(&db, "bob").await;
    let group = repo.get_or_create_individual_group("alice").await.unwrap();

    let err = repo
        .get_users(&Principal::User(bob), group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::Unauthorized { .. }));
}

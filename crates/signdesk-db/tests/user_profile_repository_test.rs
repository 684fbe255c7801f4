//! Integration tests for UserProfile repository using in-memory SurrealDB.

use signdesk_core::error::SignDeskError;
use signdesk_core::models::user::CreateUser;
use signdesk_core::models::user_profile::{CreateUserProfile, UpdateUserProfile};
use signdesk_core::repository::{UserProfileRepository, UserRepository};
use signdesk_db::repository::{SurrealUserProfileRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (Surreal<Db>, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    signdesk_db::run_migrations(&db).await.unwrap();

    let user = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            username: "alice".into(),
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    (db, user.id)
}

fn profile_for(user_id: Uuid) -> CreateUserProfile {
    CreateUserProfile {
        user_id,
        bio: Some("Curious".into()),
        website: Some("https://alice.example.com".into()),
        location: None,
        owner: None,
    }
}

#[tokio::test]
async fn create_and_lookup_by_user() {
    let (db, user_id) = setup().await;
    let repo = SurrealUserProfileRepository::new(db);

    let profile = repo.create(profile_for(user_id)).await.unwrap();
    assert_eq!(profile.user_id, user_id);
    assert_eq!(profile.bio.as_deref(), Some("Curious"));
    assert!(profile.location.is_none());

    let by_user = repo.get_by_user_id(user_id).await.unwrap();
    assert_eq!(by_user.id, profile.id);

    let by_id = repo.get_by_id(profile.id).await.unwrap();
    assert_eq!(by_id.website, profile.website);
}

#[tokio::test]
async fn one_profile_per_user() {
    let (db, user_id) = setup().await;
    let repo = SurrealUserProfileRepository::new(db);

    repo.create(profile_for(user_id)).await.unwrap();
    let err = repo.create(profile_for(user_id)).await.unwrap_err();

    assert!(
        matches!(err, SignDeskError::AlreadyExists { .. }),
        "expected AlreadyExists, got: {err:?}"
    );
}

#[tokio::test]
async fn update_sets_and_clears_fields() {
    let (db, user_id) = setup().await;
    let repo = SurrealUserProfileRepository::new(db);
    let profile = repo.create(profile_for(user_id)).await.unwrap();

    let updated = repo
        .update(
            profile.id,
            UpdateUserProfile {
                bio: Some(None),
                location: Some(Some("Oxford".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.bio.is_none());
    assert_eq!(updated.location.as_deref(), Some("Oxford"));
    assert_eq!(updated.website, profile.website);
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let (db, _) = setup().await;
    let repo = SurrealUserProfileRepository::new(db);

    let err = repo.get_by_user_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, SignDeskError::NotFound { .. }));
}

//! DataClient over the SurrealDB repositories, exercising the policy table.

use signdesk_core::models::user::{CreateUser, UpdateUser, UserFilter};
use signdesk_core::models::user_profile::{CreateUserProfile, UpdateUserProfile};
use signdesk_core::{
    ApiKeyConfig, AuthorizationPolicy, Caller, DataClient, DataErrorKind, Principal,
};
use signdesk_db::repository::{SurrealUserProfileRepository, SurrealUserRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Client = DataClient<SurrealUserRepository<Db>, SurrealUserProfileRepository<Db>>;

async fn setup(policy: AuthorizationPolicy) -> Client {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    signdesk_db::run_migrations(&db).await.unwrap();
    DataClient::new(
        SurrealUserRepository::new(db.clone()),
        SurrealUserProfileRepository::new(db),
        policy,
    )
}

fn identity(id: Uuid, username: &str, groups: &[&str]) -> Caller {
    Caller::Identity(Principal {
        user_id: id.to_string(),
        username: username.into(),
        groups: groups.iter().map(|g| g.to_string()).collect(),
    })
}

fn new_user(id: Uuid, username: &str) -> CreateUser {
    CreateUser {
        id: Some(id),
        username: username.into(),
        email: format!("{username}@example.com"),
        first_name: "Test".into(),
        last_name: "User".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn owner_is_recorded_and_may_update() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let id = Uuid::new_v4();
    let caller = identity(id, "alice", &[]);

    let user = client
        .create_user(&caller, new_user(id, "alice"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(user.owner.as_deref(), Some(id.to_string().as_str()));

    let response = client
        .update_user(
            &caller,
            id,
            UpdateUser {
                first_name: Some("Alicia".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(!response.has_errors());
    assert_eq!(response.data.unwrap().first_name, "Alicia");
}

#[tokio::test]
async fn non_owner_update_is_reported_not_raised() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let owner_id = Uuid::new_v4();
    let owner = identity(owner_id, "alice", &[]);
    client
        .create_user(&owner, new_user(owner_id, "alice"))
        .await
        .into_result()
        .unwrap();

    let stranger = identity(Uuid::new_v4(), "mallory", &[]);
    let response = client
        .update_user(
            &stranger,
            owner_id,
            UpdateUser {
                email: Some("evil@example.com".into()),
                ..Default::default()
            },
        )
        .await;

    assert!(response.data.is_none());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].kind, DataErrorKind::Unauthorized);

    // Reads by any signed-in identity are allowed.
    let read = client.get_user(&stranger, owner_id).await;
    assert!(!read.has_errors());
}

#[tokio::test]
async fn admins_may_update_any_record() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let owner_id = Uuid::new_v4();
    let owner = identity(owner_id, "alice", &[]);
    client
        .create_user(&owner, new_user(owner_id, "alice"))
        .await
        .into_result()
        .unwrap();

    let admin = identity(Uuid::new_v4(), "root", &["admins"]);
    let updated = client
        .update_user(
            &admin,
            owner_id,
            UpdateUser {
                last_name: Some("Admin-edited".into()),
                ..Default::default()
            },
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(updated.last_name, "Admin-edited");
}

#[tokio::test]
async fn duplicate_create_is_a_conflict() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let id = Uuid::new_v4();
    let caller = identity(id, "bob", &[]);

    client
        .create_user(&caller, new_user(id, "bob"))
        .await
        .into_result()
        .unwrap();
    let response = client
        .create_user(&caller, new_user(Uuid::new_v4(), "bob"))
        .await;

    assert_eq!(response.errors[0].kind, DataErrorKind::Conflict);
    assert!(response.into_result().is_err());
}

#[tokio::test]
async fn anonymous_callers_are_denied_under_user_pool() {
    let client = setup(AuthorizationPolicy::user_pool()).await;

    let response = client
        .list_users(&Caller::Anonymous, UserFilter::username("anyone"))
        .await;

    assert_eq!(response.errors[0].kind, DataErrorKind::Unauthorized);
}

#[tokio::test]
async fn list_by_username_returns_matching_record() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    for name in ["carol", "dave"] {
        let id = Uuid::new_v4();
        client
            .create_user(&identity(id, name, &[]), new_user(id, name))
            .await
            .into_result()
            .unwrap();
    }

    let reader = identity(Uuid::new_v4(), "erin", &[]);
    let users = client
        .list_users(&reader, UserFilter::username("dave"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "dave");
}

#[tokio::test]
async fn api_key_callers_may_create_without_owner() {
    let client = setup(AuthorizationPolicy::api_key(ApiKeyConfig::new("da2-test", 30))).await;
    let caller = Caller::ApiKey("da2-test".into());

    let user = client
        .create_user(&caller, new_user(Uuid::new_v4(), "frank"))
        .await
        .into_result()
        .unwrap();
    assert!(user.owner.is_none());

    let wrong = Caller::ApiKey("nope".into());
    let response = client.get_user(&wrong, user.id).await;
    assert_eq!(response.errors[0].kind, DataErrorKind::Unauthorized);
}

#[tokio::test]
async fn profile_lookup_distinguishes_absent_from_error() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let id = Uuid::new_v4();
    let caller = identity(id, "grace", &[]);
    client
        .create_user(&caller, new_user(id, "grace"))
        .await
        .into_result()
        .unwrap();

    let none = client
        .get_profile_for_user(&caller, id)
        .await
        .into_result()
        .unwrap();
    assert!(none.is_none());

    let created = client
        .create_profile(
            &caller,
            CreateUserProfile {
                user_id: id,
                bio: Some("hello".into()),
                website: None,
                location: None,
                owner: None,
            },
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(created.owner.as_deref(), Some(id.to_string().as_str()));

    let some = client
        .get_profile_for_user(&caller, id)
        .await
        .into_result()
        .unwrap();
    assert_eq!(some.map(|p| p.id), Some(created.id));
}

fn profile_for(user_id: Uuid, bio: &str) -> CreateUserProfile {
    CreateUserProfile {
        user_id,
        bio: Some(bio.into()),
        website: None,
        location: None,
        owner: None,
    }
}

#[tokio::test]
async fn identity_cannot_create_user_owned_by_another() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();

    let response = client
        .create_user(
            &identity(alice_id, "alice", &[]),
            CreateUser {
                owner: Some(bob_id.to_string()),
                ..new_user(bob_id, "bob")
            },
        )
        .await;
    assert_eq!(response.errors[0].kind, DataErrorKind::Unauthorized);

    let users = client
        .list_users(&identity(alice_id, "alice", &[]), UserFilter::username("bob"))
        .await
        .into_result()
        .unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn profile_for_another_users_record_is_denied() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();
    let alice = identity(alice_id, "alice", &[]);
    let bob = identity(bob_id, "bob", &[]);
    for (caller, id, name) in [(&alice, alice_id, "alice"), (&bob, bob_id, "bob")] {
        client
            .create_user(caller, new_user(id, name))
            .await
            .into_result()
            .unwrap();
    }

    let hijack = client
        .create_profile(&alice, profile_for(bob_id, "not bob"))
        .await;
    assert_eq!(hijack.errors[0].kind, DataErrorKind::Unauthorized);

    let claimed = client
        .create_profile(
            &alice,
            CreateUserProfile {
                owner: Some(bob_id.to_string()),
                ..profile_for(alice_id, "mine, owned by bob")
            },
        )
        .await;
    assert_eq!(claimed.errors[0].kind, DataErrorKind::Unauthorized);

    // Bob's profile slot is still free and his own.
    let profile = client
        .create_profile(&bob, profile_for(bob_id, "bob"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(profile.owner.as_deref(), Some(bob_id.to_string().as_str()));
    let updated = client
        .update_profile(
            &bob,
            profile.id,
            UpdateUserProfile {
                location: Some(Some("Lisbon".into())),
                ..Default::default()
            },
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(updated.location.as_deref(), Some("Lisbon"));
}

#[tokio::test]
async fn admin_created_profile_belongs_to_the_user() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let bob_id = Uuid::new_v4();
    let bob = identity(bob_id, "bob", &[]);
    client
        .create_user(&bob, new_user(bob_id, "bob"))
        .await
        .into_result()
        .unwrap();

    let admin = identity(Uuid::new_v4(), "root", &["admins"]);
    let profile = client
        .create_profile(&admin, profile_for(bob_id, "seeded"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(profile.owner.as_deref(), Some(bob_id.to_string().as_str()));

    let updated = client
        .update_profile(
            &bob,
            profile.id,
            UpdateUserProfile {
                bio: Some(Some("edited by bob".into())),
                ..Default::default()
            },
        )
        .await;
    assert!(!updated.has_errors());
}

#[tokio::test]
async fn profile_for_missing_user_is_not_found() {
    let client = setup(AuthorizationPolicy::user_pool()).await;
    let id = Uuid::new_v4();
    let caller = identity(id, "heidi", &[]);

    let response = client
        .create_profile(&caller, profile_for(Uuid::new_v4(), "orphan"))
        .await;

    assert!(response.data.is_none());
    assert_eq!(response.errors[0].kind, DataErrorKind::NotFound);
}

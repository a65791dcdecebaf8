use asset_library::db;
use asset_library::db::models::ContentUpload;
use asset_library::query::ListOptions;
use asset_library::validators::{Project, ProjectRegistry};
use asset_library::{Library, LibraryError};
use tempfile::TempDir;

fn upload(title: &str, data: &[u8], tags: &[&str]) -> ContentUpload {
    ContentUpload {
        title: title.into(),
        meta: r#"{"kind": "test"}"#.into(),
        data: data.to_vec(),
        tags: if tags.is_empty() {
            None
        } else {
            Some(tags.iter().map(|t| t.to_string()).collect())
        },
    }
}

fn test_library() -> (Library, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = db::create_pool(&db_path).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let registry = ProjectRegistry::new().with_project("demo", Project::new());
    (Library::new(pool, registry).unwrap(), temp_dir)
}

fn make_moderator(library: &Library, userid: i64) {
    let conn = library.pool().get().unwrap();
    conn.execute(
        "UPDATE users SET moderator = 1 WHERE oid = ?1",
        rusqlite::params![userid],
    )
    .unwrap();
}

#[tokio::test]
async fn full_content_lifecycle() {
    let (library, _temp) = test_library();

    // Authentication boundary
    let alice = library.login("ext-alice", "alice", "token-alice").await.unwrap();
    let bob = library.login("ext-bob", "bob", "token-bob").await.unwrap();
    assert_eq!(
        library.resolve_token("token-alice").await.unwrap(),
        Some(alice)
    );

    // Submit, read back
    let oid = library
        .add_content(Some(alice), "demo", upload("Red Car", &[1, 2, 3], &["vehicle"]))
        .await
        .unwrap();
    let detail = library.get_content(oid, true).await.unwrap();
    assert_eq!(detail.title, "Red Car");
    assert_eq!(detail.version, 0);
    assert_eq!(detail.tags, vec!["vehicle"]);
    assert_eq!(detail.data, vec![1, 2, 3]);

    // Social mutations are visible in the same request cycle
    library.add_like(Some(bob), oid).await.unwrap();
    let listed = library
        .list_content(None, "demo", &ListOptions::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].likes, 1);

    // Update bumps the version in place
    library
        .update_content(Some(alice), "demo", oid, upload("Red Car II", &[4], &[]))
        .await
        .unwrap();
    let detail = library.get_content(oid, false).await.unwrap();
    assert_eq!(detail.version, 1);
    assert_eq!(detail.title, "Red Car II");

    // Deletion cleans up and later reads fail
    library.delete_content(Some(alice), oid).await.unwrap();
    let err = library.get_content(oid, false).await.unwrap_err();
    assert!(matches!(err, LibraryError::NotFound));
}

#[tokio::test]
async fn moderation_flow() {
    let (library, _temp) = test_library();

    let alice = library.login("ext-alice", "alice", "token-alice").await.unwrap();
    let bob = library.login("ext-bob", "bob", "token-bob").await.unwrap();
    let momo = library.login("ext-momo", "momo", "token-momo").await.unwrap();
    make_moderator(&library, momo);

    let oid = library
        .add_content(Some(bob), "demo", upload("Spam", &[9], &[]))
        .await
        .unwrap();

    // Ordinary users report, a moderator counter-vouches
    library
        .add_report(Some(alice), "demo", oid, "DEFAULT")
        .await
        .unwrap();
    library
        .add_report(Some(momo), "demo", oid, "COUNTER_DEFAULT")
        .await
        .unwrap();
    let listed = library
        .list_content(None, "demo", &ListOptions::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1, "counter report keeps content visible");

    // Ban and purge the offender
    library
        .set_user(Some(momo), bob, Some(true), None, true)
        .await
        .unwrap();
    let listed = library
        .list_content(None, "demo", &ListOptions::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
    assert_eq!(
        library.list_banned(Some(momo)).await.unwrap()[0].userid,
        bob
    );
}

#[tokio::test]
async fn unconfigured_projects_are_read_only() {
    let (library, _temp) = test_library();
    let alice = library.login("ext-alice", "alice", "token-alice").await.unwrap();

    let err = library
        .add_content(Some(alice), "somewhere-else", upload("Nope", &[1], &[]))
        .await
        .unwrap_err();
    match err {
        LibraryError::ValidationRejected(message) => {
            assert_eq!(message, "Project is read only")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

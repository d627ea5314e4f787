mod common;

use common::{repository, strings};
use saved_objects_core::{
    AddToNamespacesOptions, BaseOptions, BulkGetObject, CreateOptions, DeleteByQueryOptions,
    DeleteFromNamespacesOptions, DeleteOptions, RepoError, SavedObjectsRepository,
};
use serde_json::json;

fn create_options(id: &str, namespace: Option<&str>) -> CreateOptions {
    CreateOptions {
        id: Some(id.to_string()),
        namespace: namespace.map(str::to_string),
        ..CreateOptions::default()
    }
}

async fn create_shared(repo: &SavedObjectsRepository, id: &str, namespaces: &[&str]) {
    let options = CreateOptions {
        initial_namespaces: Some(strings(namespaces)),
        ..create_options(id, Some(namespaces[0]))
    };
    repo.create("space-obj", json!({ "title": id }), options)
        .await
        .unwrap();
}

async fn visible_from(repo: &SavedObjectsRepository, id: &str, namespace: &str) -> bool {
    match repo
        .get("space-obj", id, BaseOptions::in_namespace(namespace))
        .await
    {
        Ok(_) => true,
        Err(err) if err.is_not_found() => false,
        Err(err) => panic!("unexpected error: {err}"),
    }
}

#[tokio::test]
async fn multi_namespace_object_is_hidden_from_other_namespaces() {
    let repo = repository();
    let created = repo
        .create("space-obj", json!({ "title": "A" }), create_options("o1", Some("ns1")))
        .await
        .unwrap();
    assert_eq!(created.namespaces, strings(&["ns1"]));

    assert!(visible_from(&repo, "o1", "ns1").await);
    assert!(!visible_from(&repo, "o1", "ns2").await);
    assert!(!visible_from(&repo, "o1", "default").await);

    let bulk = repo
        .bulk_get(
            vec![BulkGetObject::new("space-obj", "o1")],
            BaseOptions::in_namespace("ns2"),
        )
        .await
        .unwrap();
    let err = bulk.saved_objects[0].as_ref().unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}

#[tokio::test]
async fn objects_shared_to_every_namespace_are_visible_everywhere() {
    let repo = repository();
    create_shared(&repo, "o1", &["ns1", "*"]).await;
    assert!(visible_from(&repo, "o1", "anything").await);
    assert!(visible_from(&repo, "o1", "default").await);
}

#[tokio::test]
async fn add_then_remove_namespace_restores_original_visibility() {
    let repo = repository();
    repo.create("space-obj", json!({ "title": "A" }), create_options("o1", None))
        .await
        .unwrap();

    let added = repo
        .add_to_namespaces(
            "space-obj",
            "o1",
            &strings(&["ns2"]),
            AddToNamespacesOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(added.namespaces, strings(&["default", "ns2"]));
    assert!(visible_from(&repo, "o1", "ns2").await);

    let remaining = repo
        .delete_from_namespaces(
            "space-obj",
            "o1",
            &strings(&["ns2"]),
            DeleteFromNamespacesOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(remaining.namespaces, strings(&["default"]));
    assert!(!visible_from(&repo, "o1", "ns2").await);
    assert!(visible_from(&repo, "o1", "default").await);
}

#[tokio::test]
async fn adding_namespaces_deduplicates() {
    let repo = repository();
    repo.create("space-obj", json!({}), create_options("o1", None))
        .await
        .unwrap();

    let added = repo
        .add_to_namespaces(
            "space-obj",
            "o1",
            &strings(&["default", "ns2", "ns2"]),
            AddToNamespacesOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(added.namespaces, strings(&["default", "ns2"]));
}

#[tokio::test]
async fn add_with_stale_version_conflicts() {
    let repo = repository();
    let created = repo
        .create("space-obj", json!({}), create_options("o1", None))
        .await
        .unwrap();
    repo.add_to_namespaces(
        "space-obj",
        "o1",
        &strings(&["ns2"]),
        AddToNamespacesOptions::default(),
    )
    .await
    .unwrap();

    let stale = AddToNamespacesOptions {
        version: created.version,
        ..AddToNamespacesOptions::default()
    };
    let err = repo
        .add_to_namespaces("space-obj", "o1", &strings(&["ns3"]), stale)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn removing_last_namespace_deletes_object() {
    let repo = repository();
    create_shared(&repo, "o1", &["ns1", "ns2"]).await;

    let result = repo
        .delete_from_namespaces(
            "space-obj",
            "o1",
            &strings(&["ns1", "ns2"]),
            DeleteFromNamespacesOptions {
                namespace: Some("ns1".to_string()),
                ..DeleteFromNamespacesOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(result.namespaces.is_empty());

    for namespace in ["ns1", "ns2", "default"] {
        assert!(!visible_from(&repo, "o1", namespace).await);
    }
}

#[tokio::test]
async fn namespace_membership_changes_require_multi_namespace_types() {
    let repo = repository();
    repo.create("dashboard", json!({}), create_options("d1", None))
        .await
        .unwrap();

    let err = repo
        .add_to_namespaces(
            "dashboard",
            "d1",
            &strings(&["ns2"]),
            AddToNamespacesOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::BadRequest(ref reason) if reason.contains("doesn't support multiple namespaces")));

    let err = repo
        .add_to_namespaces("space-obj", "o1", &[], AddToNamespacesOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::BadRequest(_)));

    let err = repo
        .delete_from_namespaces(
            "space-obj",
            "missing",
            &strings(&["ns2"]),
            DeleteFromNamespacesOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn deleting_shared_object_requires_force() {
    let repo = repository();
    create_shared(&repo, "o1", &["ns1", "ns2"]).await;

    let err = repo
        .delete(
            "space-obj",
            "o1",
            DeleteOptions {
                namespace: Some("ns1".to_string()),
                ..DeleteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::BadRequest(ref reason) if reason.contains("force")));
    assert!(visible_from(&repo, "o1", "ns2").await);

    repo.delete(
        "space-obj",
        "o1",
        DeleteOptions {
            namespace: Some("ns1".to_string()),
            force: true,
            ..DeleteOptions::default()
        },
    )
    .await
    .unwrap();
    assert!(!visible_from(&repo, "o1", "ns2").await);
}

#[tokio::test]
async fn delete_from_foreign_namespace_is_not_found() {
    let repo = repository();
    create_shared(&repo, "o1", &["ns1"]).await;

    let err = repo
        .delete(
            "space-obj",
            "o1",
            DeleteOptions {
                namespace: Some("ns2".to_string()),
                ..DeleteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(visible_from(&repo, "o1", "ns1").await);
}

#[tokio::test]
async fn overwrite_preserves_existing_namespaces() {
    let repo = repository();
    create_shared(&repo, "o1", &["ns1", "ns2"]).await;

    let overwrite = CreateOptions {
        overwrite: true,
        ..create_options("o1", Some("ns2"))
    };
    let replaced = repo
        .create("space-obj", json!({ "title": "B" }), overwrite)
        .await
        .unwrap();
    assert_eq!(replaced.namespaces, strings(&["ns1", "ns2"]));
    assert!(visible_from(&repo, "o1", "ns1").await);
}

#[tokio::test]
async fn overwrite_from_foreign_namespace_is_not_overwritable() {
    let repo = repository();
    create_shared(&repo, "o1", &["ns1"]).await;

    let overwrite = CreateOptions {
        overwrite: true,
        ..create_options("o1", Some("ns3"))
    };
    let err = repo
        .create("space-obj", json!({}), overwrite)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Conflict {
            not_overwritable: true,
            ..
        }
    ));
    assert!(err.payload().is_not_overwritable());
}

#[tokio::test]
async fn initial_namespaces_are_validated() {
    let repo = repository();

    let on_single = CreateOptions {
        initial_namespaces: Some(strings(&["ns1"])),
        ..create_options("d1", None)
    };
    let err = repo
        .create("dashboard", json!({}), on_single)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::BadRequest(ref reason) if reason.contains("multi-namespace types")));

    let empty = CreateOptions {
        initial_namespaces: Some(Vec::new()),
        ..create_options("o1", None)
    };
    let err = repo
        .create("space-obj", json!({}), empty)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::BadRequest(ref reason) if reason.contains("non-empty")));
}

#[tokio::test]
async fn delete_by_namespace_untags_and_deletes() {
    let repo = repository();
    repo.create("dashboard", json!({}), create_options("d1", Some("ns1")))
        .await
        .unwrap();
    repo.create("dashboard", json!({}), create_options("d2", None))
        .await
        .unwrap();
    repo.create("config", json!({}), create_options("c1", Some("ns1")))
        .await
        .unwrap();
    create_shared(&repo, "shared", &["ns1", "ns2"]).await;
    create_shared(&repo, "only-ns1", &["ns1"]).await;

    let counts = repo
        .delete_by_namespace("ns1", DeleteByQueryOptions::default())
        .await
        .unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.deleted, 2);
    assert_eq!(counts.updated, 1);

    assert!(repo
        .get("dashboard", "d1", BaseOptions::in_namespace("ns1"))
        .await
        .unwrap_err()
        .is_not_found());
    assert!(repo
        .get("dashboard", "d2", BaseOptions::default())
        .await
        .is_ok());
    assert!(repo
        .get("config", "c1", BaseOptions::default())
        .await
        .is_ok());

    let shared = repo
        .get("space-obj", "shared", BaseOptions::in_namespace("ns2"))
        .await
        .unwrap();
    assert_eq!(shared.namespaces, strings(&["ns2"]));
    assert!(!visible_from(&repo, "only-ns1", "ns1").await);
}

#[tokio::test]
async fn delete_by_namespace_rejects_wildcard_and_empty_targets() {
    let repo = repository();
    for target in ["*", ""] {
        let err = repo
            .delete_by_namespace(target, DeleteByQueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::BadRequest(_)));
    }
}

#[tokio::test]
async fn delete_by_namespace_on_empty_store_reports_nothing() {
    let repo = repository();
    let counts = repo
        .delete_by_namespace("ns1", DeleteByQueryOptions::default())
        .await
        .unwrap();
    assert_eq!(counts.total, 0);
}

#[tokio::test]
async fn delete_by_workspace_untags_and_deletes() {
    let repo = repository();
    let in_workspaces = |id: &str, namespace: Option<&str>, workspaces: &[&str]| CreateOptions {
        workspaces: Some(strings(workspaces)),
        ..create_options(id, namespace)
    };
    repo.create("dashboard", json!({}), in_workspaces("d1", None, &["w1"]))
        .await
        .unwrap();
    repo.create("dashboard", json!({}), in_workspaces("d2", Some("ns1"), &["w1", "w2"]))
        .await
        .unwrap();
    repo.create("dashboard", json!({}), create_options("d3", None))
        .await
        .unwrap();

    let counts = repo
        .delete_by_workspace("w1", DeleteByQueryOptions { refresh: Some(true) })
        .await
        .unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.deleted, 1);
    assert_eq!(counts.updated, 1);

    assert!(repo
        .get("dashboard", "d1", BaseOptions::default())
        .await
        .unwrap_err()
        .is_not_found());
    let d2 = repo
        .get("dashboard", "d2", BaseOptions::in_namespace("ns1"))
        .await
        .unwrap();
    assert_eq!(d2.workspaces, Some(strings(&["w2"])));
    assert!(repo
        .get("dashboard", "d3", BaseOptions::default())
        .await
        .is_ok());

    let err = repo
        .delete_by_workspace("*", DeleteByQueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::BadRequest(_)));
}

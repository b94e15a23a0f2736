use pretty_assertions::assert_eq;
use ql_catalog::{
    Catalog, CatalogError, CatalogFormat, EntityCollection, EntityKind, LocalSnapshot, UserRecord,
};
use serde_json::json;
use std::path::Path;

const RELEASE: &str = r#"{
    "version": "2024.07",
    "tasks": [
        {"name": "Drink water", "reward": 1},
        {"id": 7, "name": "Stretch", "reward": 2}
    ],
    "quests": {
        "questA": {"title": "First steps", "xp": 50, "completed": false}
    },
    "rankedTasks": [
        {"taskId": "r1", "name": "Sprint", "level": 3}
    ]
}"#;

#[test]
fn test_json_release_resolves_ids() {
    let catalog = Catalog::from_json(RELEASE).unwrap();

    assert_eq!(
        catalog.collection(EntityKind::Task).ids(EntityKind::Task),
        vec!["Drink water".to_string(), "7".to_string()]
    );
    assert_eq!(
        catalog.collection(EntityKind::Quest).ids(EntityKind::Quest),
        vec!["questA".to_string()]
    );
    assert_eq!(catalog.ranked_tasks.len(), 1);
}

#[test]
fn test_fingerprint_ignores_key_order() {
    let a = Catalog::from_json(RELEASE).unwrap();
    let b = Catalog::from_json(
        r#"{
            "rankedTasks": [{"level": 3, "name": "Sprint", "taskId": "r1"}],
            "quests": {"questA": {"xp": 50, "completed": false, "title": "First steps"}},
            "tasks": [{"reward": 1, "name": "Drink water"}, {"reward": 2, "name": "Stretch", "id": 7}],
            "version": "2024.07"
        }"#,
    )
    .unwrap();

    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

#[test]
fn test_fingerprint_changes_with_content() {
    let a = Catalog::from_json(RELEASE).unwrap();
    let b = a.clone().with_collection(
        EntityKind::Quest,
        serde_json::from_value::<EntityCollection>(json!({"questZ": {"xp": 1}})).unwrap(),
    );
    assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

#[test]
fn test_invalid_releases_are_rejected() {
    let keyed_tasks = r#"{"version": "x", "tasks": {"walk": {}}}"#;
    assert!(matches!(
        Catalog::from_json(keyed_tasks),
        Err(CatalogError::WrongShape {
            kind: EntityKind::Task,
            ..
        })
    ));

    let anonymous = r#"{"version": "x", "rankedTasks": [{"name": "no id"}]}"#;
    assert!(matches!(
        Catalog::from_json(anonymous),
        Err(CatalogError::MissingId { position: 0, .. })
    ));

    let duplicate = r#"{"version": "x", "tasks": [{"id": "a"}, {"id": "a"}]}"#;
    assert!(matches!(
        Catalog::from_json(duplicate),
        Err(CatalogError::DuplicateId { .. })
    ));
}

#[test]
fn test_load_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("release.json");
    std::fs::write(&json_path, RELEASE).unwrap();

    let loaded = Catalog::load(&json_path).unwrap();
    assert_eq!(loaded.version, "2024.07");

    assert!(matches!(
        CatalogFormat::from_path(Path::new("release.toml")),
        Err(CatalogError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        Catalog::load(&dir.path().join("missing.yaml")),
        Err(CatalogError::Io { .. })
    ));
}

#[test]
fn test_store_record_into_snapshot() {
    let raw = json!({
        "profile": {"name": "Ada", "photo": "a.png", "rankName": "Gold", "rankImage": "g.png"},
        "points": {"current": 7, "total": 800},
        "Mpoints": {"current": 2, "total": 20},
        "xp": {"current": 30, "level": 4},
        "quests": {"questA": {"completed": true}},
        "lastUpdated": 1_700_000_000_000_i64,
        "lastLogin": "2023-11-14T22:13:20.000Z",
        "unknownField": true
    });

    let (record, malformed) = UserRecord::from_store_value(&raw);
    assert!(malformed.is_empty());

    let snapshot = LocalSnapshot::from(record.clone());
    let restored = LocalSnapshot::from_blob(&snapshot.to_blob().unwrap()).unwrap();
    assert_eq!(restored.into_record(), record);

    let mut expected = raw.clone();
    expected.as_object_mut().unwrap().remove("unknownField");
    assert_eq!(serde_json::to_value(&record).unwrap(), expected);
}

//! Behaviour of the in-memory reference store.

use kgraph_core::collections::{DOCUMENT_RELATION, SPACE_TO_TYPE, TYPES};
use kgraph_core::{
    CollectionRef, DataStage, DbOperation, IdUtils, NormalizedDoc, SpaceName, UpsertOperation,
};
use kgraph_store::{stored_id, GraphStore, MemoryStore};
use serde_json::json;
use tempfile::tempdir;
use uuid::Uuid;

fn doc(value: serde_json::Value) -> NormalizedDoc {
    NormalizedDoc::from_value(value).unwrap()
}

fn store() -> MemoryStore {
    MemoryStore::new(IdUtils::default())
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let store = store();
    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();
    for stage in DataStage::ALL {
        assert!(store.collection_exists(stage, &TYPES.collection()).await.unwrap());
        assert_eq!(store.count(stage, TYPES.name), 0);
    }
}

#[tokio::test]
async fn test_queries_on_missing_collections_are_empty() {
    let store = store();
    let target = SPACE_TO_TYPE.doc(Uuid::new_v4());
    let edges = store
        .edges_to(DataStage::Native, &DOCUMENT_RELATION.collection(), &target)
        .await
        .unwrap();
    assert!(edges.is_empty());
    assert!(!store
        .collection_exists(DataStage::Native, &DOCUMENT_RELATION.collection())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_structural_upsert_does_not_override() {
    let store = store();
    let target = TYPES.doc(Uuid::new_v4());
    let first = UpsertOperation::structural(doc(json!({"label": "first"})), target.clone());
    let second = UpsertOperation::structural(doc(json!({"label": "second"})), target.clone());
    let summary = store
        .apply(DataStage::Native, &[first.into(), second.into()])
        .await
        .unwrap();
    assert_eq!(summary.upserted, 1);
    assert_eq!(summary.skipped, 1);
    let stored = store.get_document(DataStage::Native, &target).await.unwrap().unwrap();
    assert_eq!(stored["label"], json!("first"));
    assert_eq!(stored_id(&stored), Some(target));
}

#[tokio::test]
async fn test_missing_documents_is_batched_subset() {
    let store = store();
    let present = TYPES.doc(Uuid::new_v4());
    let absent = TYPES.doc(Uuid::new_v4());
    store
        .apply(
            DataStage::Native,
            &[UpsertOperation::structural(NormalizedDoc::new(), present.clone()).into()],
        )
        .await
        .unwrap();
    let missing = store
        .missing_documents(DataStage::Native, &[present, absent.clone()])
        .await
        .unwrap();
    assert_eq!(missing.len(), 1);
    assert!(missing.contains(&absent));
}

#[tokio::test]
async fn test_delete_instance_cascades_to_bound_documents() {
    let store = store();
    let space = CollectionRef::new("myspace", false);
    let instance = space.doc(Uuid::new_v4());
    let relation = DOCUMENT_RELATION.doc(Uuid::new_v4());
    let unrelated = DOCUMENT_RELATION.doc(Uuid::new_v4());
    store
        .apply(
            DataStage::Native,
            &[
                UpsertOperation::new(Some(instance.clone()), NormalizedDoc::new(), instance.clone()).into(),
                UpsertOperation::new(Some(instance.clone()), NormalizedDoc::new(), relation.clone()).into(),
                UpsertOperation::structural(NormalizedDoc::new(), unrelated.clone()).into(),
            ],
        )
        .await
        .unwrap();

    let summary = store
        .apply(DataStage::Native, &[DbOperation::delete_instance(instance.clone())])
        .await
        .unwrap();
    assert_eq!(summary.deleted, 2);
    assert!(!store.document_exists(DataStage::Native, &relation).await.unwrap());
    assert!(store.document_exists(DataStage::Native, &unrelated).await.unwrap());
}

#[tokio::test]
async fn test_documents_sharing_identifier() {
    let store = store();
    let ids = store.id_utils().clone();
    let space = CollectionRef::new("myspace", false);
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let write = |key: Uuid, identifiers: serde_json::Value| -> DbOperation {
        let mut payload = doc(json!({
            "@id": ids.build_absolute_url(key),
            "http://schema.org/identifier": identifiers
        }));
        let all: Vec<_> = payload.all_identifiers_including_id().into_iter().collect();
        payload.insert("_identifiers", json!(all));
        UpsertOperation::new(None, payload, space.doc(key)).into()
    };
    let ops: Vec<DbOperation> = vec![write(a, json!(["x"])), write(b, json!(["x", "y"])), write(c, json!(["z"]))];
    store.apply(DataStage::Native, &ops).await.unwrap();

    let related = store
        .documents_sharing_identifier(DataStage::Native, Some(&SpaceName::new("myspace")), a)
        .await
        .unwrap();
    let mut keys: Vec<_> = related.iter().filter_map(stored_id).map(|r| r.key()).collect();
    keys.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_instances_by_identifier_searches_every_space() {
    let store = store();
    let key = Uuid::new_v4();
    let payload = doc(json!({
        "@id": "http://ns/1",
        "_identifiers": ["http://ns/1", "http://alias/1"]
    }));
    store
        .apply(
            DataStage::Native,
            &[UpsertOperation::new(None, payload, CollectionRef::new("other", false).doc(key)).into()],
        )
        .await
        .unwrap();
    let found = store
        .instances_by_identifier(DataStage::Native, None, "http://alias/1")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let scoped = store
        .instances_by_identifier(DataStage::Native, Some(&SpaceName::new("myspace")), "http://alias/1")
        .await
        .unwrap();
    assert!(scoped.is_empty());
}

#[tokio::test]
async fn test_documents_by_incoming_relation() {
    let store = store();
    let ids = store.id_utils().clone();
    let space = CollectionRef::new("myspace", false);
    let native = Uuid::new_v4();
    let inferred = Uuid::new_v4();
    let payload = doc(json!({ "_inferenceOf": [ids.build_absolute_url(native)] }));
    store
        .apply(
            DataStage::InProgress,
            &[UpsertOperation::new(None, payload, space.doc(inferred)).into()],
        )
        .await
        .unwrap();
    let found = store
        .documents_by_incoming_relation(DataStage::InProgress, None, native, "_inferenceOf")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(stored_id(&found[0]).map(|r| r.key()), Some(inferred));
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = store();
    store.ensure_schema().await.unwrap();
    let target = TYPES.doc(Uuid::new_v4());
    store
        .apply(
            DataStage::Released,
            &[UpsertOperation::structural(doc(json!({"name": "T"})), target.clone()).into()],
        )
        .await
        .unwrap();
    store.save_snapshot(&path).unwrap();

    let reloaded = MemoryStore::load_snapshot(&path, IdUtils::default()).unwrap();
    let stored = reloaded
        .get_document(DataStage::Released, &target)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["name"], json!("T"));
    assert!(reloaded
        .collection_exists(DataStage::Native, &DOCUMENT_RELATION.collection())
        .await
        .unwrap());
}

#[test]
fn test_open_without_snapshot_starts_empty() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::open(&dir.path().join("none.json"), IdUtils::default()).unwrap();
    assert!(store.collection_names(DataStage::Native).is_empty());
}

//! Structure maintenance against the in-memory store.

use kgraph_core::collections::{
    DOCUMENTS, DOCUMENT_RELATION, PROPERTIES, PROPERTY_TO_TYPE, SPACES, SPACE_TO_TYPE, TYPES,
    TYPE_TO_PROPERTY, UNRESOLVED,
};
use kgraph_core::{vocab, DataStage, DocumentRef, IdUtils, IndexedDocument, KgConfig, NormalizedDoc, SpaceName};
use kgraph_store::{stored_ref, GraphStore, MemoryStore};
use kgraph_structure::id_factory;
use kgraph_structure::{Ingestor, StaticStructureController};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const STAGE: DataStage = DataStage::Native;

fn doc(value: Value) -> NormalizedDoc {
    NormalizedDoc::from_value(value).unwrap()
}

async fn setup() -> (Arc<MemoryStore>, Ingestor, IdUtils) {
    let config = KgConfig::default();
    let store = Arc::new(MemoryStore::new(config.id_utils()));
    store.ensure_schema().await.unwrap();
    let ingestor = Ingestor::new(store.clone(), &config);
    (store, ingestor, config.id_utils())
}

/// Document relations registered against `target` as a link target.
fn relations_targeting(store: &MemoryStore, target: &DocumentRef) -> Vec<Value> {
    store
        .documents(STAGE, DOCUMENT_RELATION.name)
        .into_iter()
        .filter(|r| r.get(vocab::TARGET_ORIGINAL_DOCUMENT) == Some(&json!(target.id())))
        .collect()
}

#[tokio::test]
async fn test_static_maintenance_is_idempotent() {
    let (store, _, ids) = setup().await;
    let controller = StaticStructureController::new(store.clone());
    let key = Uuid::new_v4();
    let space = SpaceName::new("myspace");
    let document = IndexedDocument::root(
        kgraph_core::CollectionRef::from_space(&space).doc(key),
        doc(json!({
            "@id": ids.build_absolute_url(key),
            "@type": ["http://x/Person"],
            "http://schema.org/name": "Homer",
            "http://schema.org/age": 39
        })),
    );

    let first = controller
        .ensure_static_elements_and_clean_document_structure(STAGE, &document, &document.id)
        .await
        .unwrap();
    assert!(!first.operations.is_empty());
    store.apply(STAGE, &first.operations).await.unwrap();

    let second = controller
        .ensure_static_elements_and_clean_document_structure(STAGE, &document, &document.id)
        .await
        .unwrap();
    assert!(second.operations.is_empty(), "unexpected: {:?}", second.operations);
    assert_eq!(first.required, second.required);
}

#[tokio::test]
async fn test_ingest_creates_structure_and_relations() {
    let (store, ingestor, ids) = setup().await;
    let space = SpaceName::new("myspace");
    let key = Uuid::new_v4();
    let payload = json!({
        "@id": ids.build_absolute_url(key),
        "@type": "http://x/Person",
        "http://schema.org/name": "Homer"
    });

    ingestor.upsert(STAGE, &space, doc(payload.clone())).await.unwrap();
    assert_eq!(store.count(STAGE, TYPES.name), 1);
    assert_eq!(store.count(STAGE, SPACES.name), 1);
    assert_eq!(store.count(STAGE, SPACE_TO_TYPE.name), 1);
    // @id, @type, name
    assert_eq!(store.count(STAGE, PROPERTIES.name), 3);
    assert_eq!(store.count(STAGE, TYPE_TO_PROPERTY.name), 3);
    assert_eq!(store.count(STAGE, DOCUMENTS.name), 1);
    // space2type + 3 × (type2property, value kind)
    assert_eq!(store.count(STAGE, DOCUMENT_RELATION.name), 7);

    let report = ingestor.upsert(STAGE, &space, doc(payload)).await.unwrap();
    assert_eq!(report.summary.deleted, 7);
    assert_eq!(store.count(STAGE, DOCUMENT_RELATION.name), 7);
    assert_eq!(store.count(STAGE, TYPE_TO_PROPERTY.name), 3);
}

#[tokio::test]
async fn test_documents_without_namespace_ids_are_rejected() {
    let (_, ingestor, _) = setup().await;
    let result = ingestor
        .upsert(STAGE, &SpaceName::new("myspace"), doc(json!({"@id": "http://elsewhere/1"})))
        .await;
    assert!(matches!(result, Err(kgraph_core::KgError::MalformedDocument(_))));
}

#[tokio::test]
async fn test_link_to_known_target_is_registered() {
    let (store, ingestor, ids) = setup().await;
    let space = SpaceName::new("myspace");
    let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
    ingestor
        .upsert(STAGE, &space, doc(json!({"@id": ids.build_absolute_url(d), "@type": "http://x/A"})))
        .await
        .unwrap();
    ingestor
        .upsert(
            STAGE,
            &space,
            doc(json!({
                "@id": ids.build_absolute_url(p),
                "@type": "http://x/P",
                "http://x/rel": {"@id": ids.build_absolute_url(d)}
            })),
        )
        .await
        .unwrap();

    assert_eq!(store.count(STAGE, UNRESOLVED.name), 0);
    assert_eq!(store.count(STAGE, PROPERTY_TO_TYPE.name), 1);
    let target = kgraph_core::CollectionRef::from_space(&space).doc(d);
    assert_eq!(relations_targeting(&store, &target).len(), 1);
}

#[tokio::test]
async fn test_type_drift_repair() {
    let (store, ingestor, ids) = setup().await;
    let space = SpaceName::new("myspace");
    let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
    let target = kgraph_core::CollectionRef::from_space(&space).doc(d);
    let pointer = json!({
        "@id": ids.build_absolute_url(p),
        "@type": "http://x/P",
        "http://x/rel": {"@id": ids.build_absolute_url(d)}
    });

    ingestor.upsert(STAGE, &space, doc(pointer.clone())).await.unwrap();
    assert_eq!(store.count(STAGE, UNRESOLVED.name), 1);

    ingestor
        .upsert(STAGE, &space, doc(json!({"@id": ids.build_absolute_url(d), "@type": "http://x/A"})))
        .await
        .unwrap();
    assert_eq!(store.count(STAGE, UNRESOLVED.name), 0);
    let relations = relations_targeting(&store, &target);
    assert_eq!(relations.len(), 1);

    ingestor
        .upsert(STAGE, &space, doc(json!({"@id": ids.build_absolute_url(d), "@type": "http://x/B"})))
        .await
        .unwrap();
    let relations = relations_targeting(&store, &target);
    assert_eq!(relations.len(), 1);
    let link = stored_ref(&relations[0], vocab::TO).unwrap();
    let link = store.get_document(STAGE, &link).await.unwrap().unwrap();
    assert_eq!(
        stored_ref(&link, vocab::TO),
        Some(id_factory::space_to_type(&space, "http://x/B"))
    );
    assert_eq!(link[vocab::ORIGINAL_LABEL], json!("http://x/rel"));

    // Re-ingesting the pointer keeps exactly one registration.
    ingestor.upsert(STAGE, &space, doc(pointer)).await.unwrap();
    assert_eq!(relations_targeting(&store, &target).len(), 1);
}

#[tokio::test]
async fn test_delete_falls_back_to_unresolved_links() {
    let (store, ingestor, ids) = setup().await;
    let space = SpaceName::new("myspace");
    let (d, p) = (Uuid::new_v4(), Uuid::new_v4());
    let target = kgraph_core::CollectionRef::from_space(&space).doc(d);
    ingestor
        .upsert(STAGE, &space, doc(json!({"@id": ids.build_absolute_url(d), "@type": "http://x/A"})))
        .await
        .unwrap();
    ingestor
        .upsert(
            STAGE,
            &space,
            doc(json!({
                "@id": ids.build_absolute_url(p),
                "@type": "http://x/P",
                "http://x/rel": {"@id": ids.build_absolute_url(d)}
            })),
        )
        .await
        .unwrap();

    ingestor.delete(STAGE, &target).await.unwrap();
    assert!(!store.document_exists(STAGE, &target).await.unwrap());
    assert!(relations_targeting(&store, &target).is_empty());
    assert_eq!(store.count(STAGE, DOCUMENTS.name), 1);
    let unresolved = store.documents(STAGE, UNRESOLVED.name);
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0][vocab::ORIGINAL_TO], json!(ids.build_absolute_url(d)));

    // Re-creating the target links it again.
    ingestor
        .upsert(STAGE, &space, doc(json!({"@id": ids.build_absolute_url(d), "@type": "http://x/A"})))
        .await
        .unwrap();
    assert_eq!(store.count(STAGE, UNRESOLVED.name), 0);
    assert_eq!(relations_targeting(&store, &target).len(), 1);
}

#[tokio::test]
async fn test_delete_of_unknown_document_is_not_found() {
    let (_, ingestor, _) = setup().await;
    let missing = kgraph_core::CollectionRef::new("myspace", false).doc(Uuid::new_v4());
    let result = ingestor.delete(STAGE, &missing).await;
    assert!(matches!(result, Err(kgraph_core::KgError::NotFound(_))));
}

#[tokio::test]
async fn test_tracker_queries_tolerate_missing_collections() {
    let store = Arc::new(MemoryStore::new(IdUtils::default()));
    let tracker = kgraph_structure::StructureTracker::new(store, true);
    let target = kgraph_core::CollectionRef::new("myspace", false).doc(Uuid::new_v4());
    assert!(tracker.create_delete_operations(STAGE, &target).await.unwrap().is_empty());
    assert!(tracker.find_incoming_properties(STAGE, &target).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lookup_by_identifier() {
    let (_, ingestor, ids) = setup().await;
    let space = SpaceName::new("myspace");
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    for key in [a, b] {
        ingestor
            .upsert(
                STAGE,
                &space,
                doc(json!({
                    "@id": ids.build_absolute_url(key),
                    "http://schema.org/identifier": ["shared"]
                })),
            )
            .await
            .unwrap();
    }
    let found = ingestor.lookup(STAGE, &ids.build_absolute_url(a)).await.unwrap();
    assert_eq!(found.map(|d| d.document_id()), Some(a));
    assert!(ingestor.lookup(STAGE, "unknown").await.unwrap().is_none());
    assert!(matches!(
        ingestor.lookup(STAGE, "shared").await,
        Err(kgraph_core::KgError::Ambiguous(_))
    ));
}

#[tokio::test]
async fn test_spaces_named_like_internal_collections_are_rejected() {
    let (store, ingestor, ids) = setup().await;
    let key = Uuid::new_v4();
    let person = json!({
        "@id": ids.build_absolute_url(key),
        "@type": "http://x/A",
        "http://schema.org/name": "Homer"
    });

    let result = ingestor.upsert(STAGE, &SpaceName::new("documents"), doc(person.clone())).await;
    assert!(matches!(result, Err(kgraph_core::KgError::MalformedDocument(_))));
    assert!(!store.document_exists(STAGE, &DOCUMENTS.doc(key)).await.unwrap());

    // Structure vertices cannot be removed through the instance path either.
    ingestor.upsert(STAGE, &SpaceName::new("myspace"), doc(person)).await.unwrap();
    let result = ingestor.delete(STAGE, &DOCUMENTS.doc(key)).await;
    assert!(matches!(result, Err(kgraph_core::KgError::MalformedDocument(_))));
    assert!(store.document_exists(STAGE, &DOCUMENTS.doc(key)).await.unwrap());
}

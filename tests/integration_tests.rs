//! Integration tests for the complete KGraph pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Ingestion → structure graph → snapshot
//! - Native documents → reconciliation → inferred stage (with its own structure)
//!
//! Run with: cargo test --test integration_tests

use kgraph_core::collections::{DOCUMENT_RELATION, SPACES, SPACE_TO_TYPE, TYPES};
use kgraph_core::{CollectionRef, DataStage, EventKind, IdUtils, IndexedDocument, KgConfig, NormalizedDoc, SpaceName};
use kgraph_inference::{InferredDocument, Reconciler};
use kgraph_store::{GraphStore, MemoryStore};
use kgraph_structure::{create_meta_representation, Ingestor};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::tempdir;
use uuid::Uuid;

const PERSON: &str = "http://x/Person";

struct Pipeline {
    store: Arc<MemoryStore>,
    ingestor: Ingestor,
    reconciler: Reconciler,
    ids: IdUtils,
    space: SpaceName,
}

impl Pipeline {
    async fn with_store(store: MemoryStore, config: &KgConfig) -> Self {
        let store = Arc::new(store);
        store.ensure_schema().await.unwrap();
        Self {
            ingestor: Ingestor::new(store.clone(), config),
            reconciler: Reconciler::new(store.clone(), config),
            ids: config.id_utils(),
            space: SpaceName::new("people"),
            store,
        }
    }

    async fn new() -> Self {
        let config = KgConfig::default();
        Self::with_store(MemoryStore::new(config.id_utils()), &config).await
    }

    async fn ingest(&self, key: Uuid, identifiers: &[&str], name: &str) {
        let doc = NormalizedDoc::from_value(json!({
            "@id": self.ids.build_absolute_url(key),
            "@type": PERSON,
            "http://schema.org/identifier": identifiers,
            "http://schema.org/name": name
        }))
        .unwrap();
        self.ingestor.upsert(DataStage::Native, &self.space, doc).await.unwrap();
    }

    async fn reconcile(&self, key: Uuid) -> Vec<kgraph_core::Event> {
        let events = self.reconciler.reconcile(&self.space, key).await.unwrap();
        self.ingestor
            .commit_inference_events(self.reconciler.inferred_stage(), &events)
            .await
            .unwrap();
        events
    }

    fn inferred(&self) -> Vec<InferredDocument> {
        self.store
            .documents(self.reconciler.inferred_stage(), self.space.as_str())
            .into_iter()
            .map(|raw| IndexedDocument::from_payload(raw).unwrap())
            .map(|d| InferredDocument::from_doc(d.doc))
            .collect()
    }
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_meta_representation_is_deterministic() {
    let first = create_meta_representation(PERSON, &TYPES.collection());
    let second = create_meta_representation(PERSON, &TYPES.collection());
    assert_eq!(first, second);
    let other = create_meta_representation(PERSON, &SPACES.collection());
    assert_ne!(first.id, other.id);
    assert_eq!(first.label, "Person");
}

#[tokio::test]
async fn test_structure_survives_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let config = KgConfig::default();

    let pipeline = Pipeline::new().await;
    let key = Uuid::new_v4();
    pipeline.ingest(key, &["homer"], "Homer").await;
    pipeline.store.save_snapshot(&path).unwrap();

    let reopened = Pipeline::with_store(MemoryStore::open(&path, config.id_utils()).unwrap(), &config).await;
    for collection in [TYPES.name, SPACE_TO_TYPE.name, DOCUMENT_RELATION.name] {
        assert_eq!(
            reopened.store.count(DataStage::Native, collection),
            pipeline.store.count(DataStage::Native, collection),
            "{collection}"
        );
    }

    // Re-ingesting the unchanged document replaces its relations one for one.
    let relations = reopened.store.count(DataStage::Native, DOCUMENT_RELATION.name);
    reopened.ingest(key, &["homer"], "Homer").await;
    assert_eq!(reopened.store.count(DataStage::Native, DOCUMENT_RELATION.name), relations);
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_inferred_instances_get_their_own_structure() {
    let pipeline = Pipeline::new().await;
    let key = Uuid::new_v4();
    pipeline.ingest(key, &["homer"], "Homer").await;
    pipeline.reconcile(key).await;

    let stage = pipeline.reconciler.inferred_stage();
    assert_eq!(pipeline.store.count(stage, TYPES.name), 1);
    assert_eq!(pipeline.store.count(stage, SPACE_TO_TYPE.name), 1);
    assert!(pipeline.store.count(stage, DOCUMENT_RELATION.name) > 0);
}

#[tokio::test]
async fn test_foo_bar_lifecycle() {
    let pipeline = Pipeline::new().await;
    let (foo, bar) = (Uuid::new_v4(), Uuid::new_v4());

    pipeline.ingest(foo, &["foo"], "Foo").await;
    assert_eq!(
        pipeline.reconcile(foo).await.iter().map(|e| e.kind).collect::<Vec<_>>(),
        vec![EventKind::Insert]
    );
    let inferred = pipeline.inferred();
    assert_eq!(inferred.len(), 1);
    assert_eq!(inferred[0].inference_of(), vec![pipeline.ids.build_absolute_url(foo)]);

    pipeline.ingest(bar, &["bar"], "Bar").await;
    pipeline.reconcile(bar).await;
    assert_eq!(pipeline.inferred().len(), 2);

    // foo now also claims "bar": both inferred instances collapse into one.
    pipeline.ingest(foo, &["foo", "bar"], "Foo").await;
    let events = pipeline.reconcile(foo).await;
    assert_eq!(events.iter().filter(|e| e.kind == EventKind::Delete).count(), 2);
    assert_eq!(events.iter().filter(|e| e.kind == EventKind::Insert).count(), 1);
    let merged_key = events
        .iter()
        .find(|e| e.kind == EventKind::Insert)
        .map(|e| e.document_id)
        .unwrap();
    assert!(merged_key != foo && merged_key != bar);

    let inferred = pipeline.inferred();
    assert_eq!(inferred.len(), 1);
    let members: BTreeSet<String> = inferred[0].inference_of().into_iter().collect();
    assert_eq!(
        members,
        BTreeSet::from([pipeline.ids.build_absolute_url(foo), pipeline.ids.build_absolute_url(bar)])
    );
    // Both names were contributed without timestamps: the alternatives keep both.
    assert_eq!(inferred[0].alternatives_for("http://schema.org/name").len(), 2);

    // Nothing changed: a second run is silent.
    assert!(pipeline.reconcile(foo).await.is_empty());
    assert!(pipeline.reconcile(bar).await.is_empty());

    // Dropping foo keeps the merged instance alive for bar.
    pipeline
        .ingestor
        .delete(DataStage::Native, &CollectionRef::from_space(&pipeline.space).doc(foo))
        .await
        .unwrap();
    let events = pipeline.reconcile(foo).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Update);
    assert_eq!(events[0].document_id, merged_key);
    let inferred = pipeline.inferred();
    assert_eq!(inferred.len(), 1);
    assert_eq!(inferred[0].inference_of(), vec![pipeline.ids.build_absolute_url(bar)]);
    assert!(inferred[0].doc().identifiers().contains("foo"));
}

#[tokio::test]
async fn test_reconcile_runs_are_independent_of_trigger() {
    let pipeline = Pipeline::new().await;
    let keys: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    pipeline.ingest(keys[0], &["a"], "A").await;
    pipeline.ingest(keys[1], &["a", "b"], "A").await;
    pipeline.ingest(keys[2], &["b"], "A").await;
    pipeline.ingest(keys[3], &["c"], "C").await;

    let events = pipeline.reconcile(keys[2]).await;
    assert_eq!(events.len(), 1);
    for key in &keys[..3] {
        assert!(pipeline.reconcile(*key).await.is_empty());
    }
    assert_eq!(pipeline.reconcile(keys[3]).await.len(), 1);
    assert_eq!(pipeline.inferred().len(), 2);
}

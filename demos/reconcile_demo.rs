//! Two people records from different sources, linked by a shared ORCID,
//! reconciled into one inferred instance.
//!
//! Run with: cargo run --example reconcile_demo

use kgraph_core::{DataStage, KgConfig, NormalizedDoc, SpaceName};
use kgraph_inference::{InferredDocument, Reconciler};
use kgraph_store::{GraphStore, MemoryStore};
use kgraph_structure::Ingestor;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = KgConfig::default();
    let ids = config.id_utils();
    let store = Arc::new(MemoryStore::new(ids.clone()));
    store.ensure_schema().await?;
    let ingestor = Ingestor::new(store.clone(), &config);
    let reconciler = Reconciler::new(store.clone(), &config);
    let space = SpaceName::new("people");

    let (registry, lab) = (Uuid::new_v4(), Uuid::new_v4());
    for (key, name, updated) in [
        (registry, "Homer", "2021-03-01T00:00:00Z"),
        (lab, "Homer J. Simpson", "2023-07-15T00:00:00Z"),
    ] {
        let doc = NormalizedDoc::from_value(json!({
            "@id": ids.build_absolute_url(key),
            "@type": "https://schema.org/Person",
            "http://schema.org/identifier": ["https://orcid.org/0000-0002-1825-0097"],
            "http://schema.org/name": name,
            "https://core.kg.ebrains.eu/vocab/meta/propertyUpdates": {
                "http://schema.org/name": updated
            }
        }))?;
        ingestor.upsert(DataStage::Native, &space, doc).await?;
    }

    let events = reconciler.reconcile(&space, registry).await?;
    for event in &events {
        println!("{} {}/{}", event.kind, event.space, event.document_id);
    }
    ingestor
        .commit_inference_events(reconciler.inferred_stage(), &events)
        .await?;

    for raw in store.documents(reconciler.inferred_stage(), space.as_str()) {
        let instance = InferredDocument::from_doc(NormalizedDoc::from_value(raw)?);
        println!("name: {}", instance.doc().get("http://schema.org/name").cloned().unwrap_or_default());
        for alternative in instance.alternatives_for("http://schema.org/name") {
            let marker = if alternative.selected { "*" } else { " " };
            println!("  {marker} {}", alternative.value);
        }
        println!("inferred from: {:?}", instance.inference_of());
    }

    let again = reconciler.reconcile(&space, lab).await?;
    println!("second run: {} event(s)", again.len());
    Ok(())
}

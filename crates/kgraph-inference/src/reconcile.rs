//! Reconciliation of native documents into inferred instances.
//!
//! A run is keyed by one triggering document:
//!
//! ```text
//!   discover ──► partition ──► merge (per unit) ──► diff against existing ──► events
//! ```
//!
//! Discovery touches the store; everything after it is a pure function of
//! the discovered documents and instances.

use crate::inferred::{Alternative, InferredDocument};
use crate::union_find::UnionFind;
use kgraph_core::{
    vocab, DataStage, Event, EventKind, IdUtils, IndexedDocument, KgConfig, KgError, NormalizedDoc, Result,
    SpaceName,
};
use kgraph_store::GraphStore;
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// Native documents and existing inferred instances a run has to consider.
#[derive(Debug, Default)]
pub struct InvolvedPayloads {
    pub documents: Vec<IndexedDocument>,
    pub existing_instances: Vec<IndexedDocument>,
}

/// Outcome of comparing newly merged documents with the existing instances.
#[derive(Debug, Default)]
pub struct InferenceResult {
    pub to_be_inserted: Vec<InferredDocument>,
    /// New document and the single instance it replaces.
    pub to_be_updated: Vec<(InferredDocument, IndexedDocument)>,
    /// New document and the instances it collides with.
    pub to_be_merged: Vec<(InferredDocument, Vec<IndexedDocument>)>,
    pub to_be_removed: Vec<IndexedDocument>,
}

pub struct Reconciler {
    store: Arc<dyn GraphStore>,
    ids: IdUtils,
    inferred_stage: DataStage,
}

impl Reconciler {
    pub fn new(store: Arc<dyn GraphStore>, config: &KgConfig) -> Self {
        Self {
            store,
            ids: config.id_utils(),
            inferred_stage: config.reconcile.stage,
        }
    }

    pub fn inferred_stage(&self) -> DataStage {
        self.inferred_stage
    }

    /// Events bringing the inferred instances around `id` up to date.
    pub async fn reconcile(&self, space: &SpaceName, id: Uuid) -> Result<Vec<Event>> {
        space.validate()?;
        let involved = self.find_involved_documents(Some(space), id).await?;
        tracing::debug!(
            trigger = %id,
            documents = involved.documents.len(),
            instances = involved.existing_instances.len(),
            "discovered involved documents"
        );
        let inferred = self.reconcile_documents(&involved.documents);
        let result = compare_inferred_instances(&involved.existing_instances, inferred);
        tracing::debug!(
            insert = result.to_be_inserted.len(),
            update = result.to_be_updated.len(),
            merge = result.to_be_merged.len(),
            remove = result.to_be_removed.len(),
            "compared inferred instances"
        );
        self.translate_inference_result_to_events(space, result)
    }

    // ========================================================================
    // Discover
    // ========================================================================

    /// Closure over shared identifiers and existing inferred instances, as a
    /// work queue.
    pub async fn find_involved_documents(&self, space: Option<&SpaceName>, id: Uuid) -> Result<InvolvedPayloads> {
        let mut handled_documents: HashSet<Uuid> = HashSet::new();
        let mut handled_instances: HashSet<Uuid> = HashSet::new();
        let mut documents: BTreeMap<Uuid, IndexedDocument> = BTreeMap::new();
        let mut instances: BTreeMap<Uuid, IndexedDocument> = BTreeMap::new();
        let mut frontier = VecDeque::from([id]);

        while let Some(next) = frontier.pop_front() {
            if !handled_documents.insert(next) {
                continue;
            }
            for raw in self
                .store
                .documents_sharing_identifier(DataStage::Native, space, next)
                .await?
            {
                let document = IndexedDocument::from_payload(raw)?;
                if document.embedded {
                    continue;
                }
                let document_id = document.document_id();
                if !handled_documents.contains(&document_id) {
                    frontier.push_back(document_id);
                }
                documents.insert(document_id, document);
            }

            let mut inferred = self
                .store
                .documents_by_incoming_relation(self.inferred_stage, space, next, vocab::INFERENCE_OF)
                .await?;
            if inferred.len() > 1 {
                let found: Vec<String> = inferred
                    .iter()
                    .filter_map(|i| i.get(vocab::ID).and_then(Value::as_str).map(str::to_string))
                    .collect();
                tracing::warn!(document = %next, instances = ?found, "more than one inferred instance");
                return Err(KgError::InvariantViolation(format!(
                    "there are {} inferred instances for {next} ({})",
                    found.len(),
                    found.join(", ")
                )));
            }
            if let Some(raw) = inferred.pop() {
                let instance = IndexedDocument::from_payload(raw)?;
                if handled_instances.insert(instance.document_id()) {
                    let members = InferredDocument::from_doc(instance.doc.clone()).inference_of();
                    frontier.extend(
                        members
                            .iter()
                            .filter_map(|member| self.ids.get_uuid(member))
                            .filter(|member| !handled_documents.contains(member)),
                    );
                    instances.insert(instance.document_id(), instance);
                }
            }
        }

        Ok(InvolvedPayloads {
            documents: documents.into_values().collect(),
            existing_instances: instances.into_values().collect(),
        })
    }

    // ========================================================================
    // Merge
    // ========================================================================

    pub fn reconcile_documents(&self, documents: &[IndexedDocument]) -> Vec<InferredDocument> {
        extract_reconcile_units(documents)
            .iter()
            .map(|unit| self.merge(unit))
            .collect()
    }

    /// Merge one reconcile unit into a single inferred document.
    pub fn merge(&self, unit: &[&IndexedDocument]) -> InferredDocument {
        let mut contributors: Vec<&IndexedDocument> = unit.to_vec();
        contributors.sort_by_key(|d| d.document_id());

        let keys: BTreeSet<&String> = contributors
            .iter()
            .copied()
            .flat_map(|d| d.doc.public_keys())
            .filter(|k| k.as_str() != vocab::META_PROPERTY_UPDATES)
            .collect();

        let mut inferred = InferredDocument::new();
        let mut alternatives = Map::new();
        for key in keys {
            let mut for_key: Vec<&IndexedDocument> = contributors
                .iter()
                .copied()
                .filter(|d| d.doc.contains_key(key) || has_property_update(&d.doc, key))
                .collect();

            if let [single] = for_key.as_slice() {
                let value = single.doc.get(key).cloned().unwrap_or(Value::Null);
                if key == vocab::SCHEMA_ORG_IDENTIFIER {
                    inferred.doc_mut().set_identifiers(single.doc.identifiers());
                } else if !value.is_null() {
                    inferred.doc_mut().insert(key.clone(), value.clone());
                }
                if records_alternatives(key) {
                    let alternative = Alternative {
                        selected: true,
                        users: single.doc.user().into_iter().collect(),
                        value,
                    };
                    alternatives.insert(key.clone(), Value::Array(vec![alternative.to_value()]));
                }
                continue;
            }

            sort_by_field_change(key, &mut for_key);
            match key.as_str() {
                // A fresh or reused id is assigned when translating to events.
                vocab::JSONLD_ID => {}
                // Reconstructable from the alternatives.
                vocab::META_USER => {}
                vocab::SCHEMA_ORG_IDENTIFIER => {
                    let identifiers = for_key.iter().flat_map(|d| d.doc.identifiers()).collect();
                    inferred.doc_mut().set_identifiers(identifiers);
                }
                vocab::JSONLD_TYPE => {
                    let types: BTreeSet<String> = for_key.iter().flat_map(|d| d.doc.types()).collect();
                    inferred.doc_mut().set_types(types);
                }
                _ => {
                    let first = for_key[0];
                    if let Some(value) = first.doc.get(key).filter(|v| !v.is_null()) {
                        inferred.doc_mut().insert(key.clone(), value.clone());
                    }
                    if records_alternatives(key) {
                        let grouped = alternatives_by_value(key, &for_key);
                        if grouped.is_empty() {
                            alternatives.remove(key.as_str());
                        } else {
                            alternatives.insert(key.clone(), Value::Array(grouped));
                        }
                    }
                }
            }
        }

        inferred.set_alternatives(alternatives);
        inferred.set_inference_of(
            contributors
                .iter()
                .map(|d| self.ids.build_absolute_url(d.document_id()))
                .collect(),
        );
        inferred
    }

    // ========================================================================
    // Emit
    // ========================================================================

    pub fn translate_inference_result_to_events(
        &self,
        space: &SpaceName,
        result: InferenceResult,
    ) -> Result<Vec<Event>> {
        let mut events = Vec::new();

        for inserted in result.to_be_inserted {
            let mut doc = inserted.into_doc();
            let id = match doc.id() {
                Some(id) => id.to_string(),
                None => {
                    let id = self.ids.build_absolute_url(Uuid::new_v4());
                    doc.set_id(&id);
                    id
                }
            };
            let key = self.instance_key(&id)?;
            events.push(Event::upsert(space.clone(), key, EventKind::Insert, doc));
        }

        for (updated, previous) in result.to_be_updated {
            let mut doc = updated.into_doc();
            let previous_id = previous
                .doc
                .id()
                .map_or_else(|| self.ids.build_absolute_url(previous.document_id()), str::to_string);
            doc.set_id(&previous_id);
            doc.add_identifiers(previous.doc.identifiers());
            if doc == previous.doc {
                tracing::trace!(instance = %previous.id, "inferred instance unchanged");
                continue;
            }
            events.push(Event::upsert(space.clone(), previous.document_id(), EventKind::Update, doc));
        }

        for removed in &result.to_be_removed {
            events.push(self.delete_event(space, removed));
        }

        for (merged, collided) in result.to_be_merged {
            let mut doc = merged.into_doc();
            let key = Uuid::new_v4();
            doc.set_id(&self.ids.build_absolute_url(key));
            doc.add_identifiers(
                collided
                    .iter()
                    .flat_map(|c| c.doc.all_identifiers_including_id())
                    .collect::<BTreeSet<_>>(),
            );
            tracing::debug!(instance = %key, collided = collided.len(), "merging inferred instances");
            events.extend(collided.iter().map(|c| self.delete_event(space, c)));
            events.push(Event::upsert(space.clone(), key, EventKind::Insert, doc));
        }
        Ok(events)
    }

    fn delete_event(&self, space: &SpaceName, instance: &IndexedDocument) -> Event {
        let key = instance.document_id();
        Event::delete(space.clone(), key, self.ids.build_absolute_url(key))
    }

    fn instance_key(&self, id: &str) -> Result<Uuid> {
        self.ids
            .get_uuid(id)
            .ok_or_else(|| KgError::MalformedDocument(format!("{id} is not an instance id")))
    }
}

// ============================================================================
// Partition / diff
// ============================================================================

/// Identifier-equivalence classes: two documents belong together iff their
/// identifier sets (including `@id`) intersect, transitively.
pub fn extract_reconcile_units(documents: &[IndexedDocument]) -> Vec<Vec<&IndexedDocument>> {
    let mut sets = UnionFind::new(documents.len());
    let mut first_holder: HashMap<String, usize> = HashMap::new();
    for (index, document) in documents.iter().enumerate() {
        for identifier in document.doc.all_identifiers_including_id() {
            match first_holder.entry(identifier) {
                Entry::Occupied(holder) => {
                    sets.union(*holder.get(), index);
                }
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }
    }
    sets.groups()
        .into_iter()
        .map(|group| group.into_iter().map(|i| &documents[i]).collect())
        .collect()
}

/// Match each new document against the existing instances sharing one of
/// its identifiers.
///
/// When a merged instance falls apart, every part still shares identifiers
/// with it and is classified as its update; the last of those updates wins.
pub fn compare_inferred_instances(
    existing: &[IndexedDocument],
    new_instances: Vec<InferredDocument>,
) -> InferenceResult {
    let mut result = InferenceResult::default();
    let mut claims: HashMap<usize, usize> = HashMap::new();

    for new_instance in new_instances {
        let identifiers = new_instance.doc().all_identifiers_including_id();
        let related: Vec<usize> = existing
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.doc.all_identifiers_including_id().is_disjoint(&identifiers))
            .map(|(i, _)| i)
            .collect();
        for &index in &related {
            *claims.entry(index).or_default() += 1;
        }
        match related.as_slice() {
            [] => result.to_be_inserted.push(new_instance),
            [only] => result.to_be_updated.push((new_instance, existing[*only].clone())),
            _ => result
                .to_be_merged
                .push((new_instance, related.iter().map(|&i| existing[i].clone()).collect())),
        }
    }

    for (&index, &count) in &claims {
        if count > 1 {
            tracing::warn!(
                instance = %existing[index].id,
                claims = count,
                "several new instances match one existing instance"
            );
        }
    }

    result.to_be_removed = existing
        .iter()
        .enumerate()
        .filter(|(i, _)| !claims.contains_key(i))
        .map(|(_, e)| e.clone())
        .collect();
    result
}

// ============================================================================
// Helpers
// ============================================================================

fn has_property_update(doc: &NormalizedDoc, key: &str) -> bool {
    doc.get(vocab::META_PROPERTY_UPDATES)
        .and_then(Value::as_object)
        .map_or(false, |updates| updates.contains_key(key))
}

/// Newest change first; documents without a timestamp for `key` last.
fn sort_by_field_change(key: &str, documents: &mut [&IndexedDocument]) {
    documents.sort_by_key(|d| {
        let changed = d.doc.field_update_times().get(key).copied();
        (changed.is_none(), Reverse(changed))
    });
}

fn records_alternatives(key: &str) -> bool {
    !(vocab::is_internal_key(key)
        || vocab::is_jsonld_keyword(key)
        || key == vocab::SCHEMA_ORG_IDENTIFIER
        || key == vocab::META_USER
        || key == vocab::META_SPACE
        || key == vocab::META_PROPERTY_UPDATES)
}

/// One alternative per distinct value, in contributor order. The value of
/// the first (newest) contributor is the selected one.
fn alternatives_by_value(key: &str, sorted: &[&IndexedDocument]) -> Vec<Value> {
    let mut groups: Vec<(Value, Vec<&IndexedDocument>)> = Vec::new();
    for document in sorted {
        let value = document.doc.get(key).cloned().unwrap_or(Value::Null);
        match groups.iter_mut().find(|(v, _)| *v == value) {
            Some((_, members)) => members.push(document),
            None => groups.push((value, vec![document])),
        }
    }
    groups
        .into_iter()
        .enumerate()
        .map(|(index, (value, members))| {
            let mut users: Vec<String> = Vec::new();
            for user in members.iter().filter_map(|d| d.doc.user()) {
                if !users.contains(&user) {
                    users.push(user);
                }
            }
            Alternative {
                selected: index == 0,
                users,
                value,
            }
            .to_value()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::CollectionRef;
    use serde_json::json;

    fn indexed(value: Value) -> IndexedDocument {
        IndexedDocument::root(
            CollectionRef::new("myspace", false).doc(Uuid::new_v4()),
            NormalizedDoc::from_value(value).unwrap(),
        )
    }

    #[test]
    fn test_partition_is_transitive() {
        let documents = vec![
            indexed(json!({"http://schema.org/identifier": ["a"]})),
            indexed(json!({"http://schema.org/identifier": ["c"]})),
            indexed(json!({"http://schema.org/identifier": ["a", "b"]})),
        ];
        let units = extract_reconcile_units(&documents);
        assert_eq!(units.len(), 2);
        let sizes: BTreeSet<usize> = units.iter().map(Vec::len).collect();
        assert_eq!(sizes, BTreeSet::from([1, 2]));
        let ab = units.iter().find(|u| u.len() == 2).unwrap();
        assert!(ab.iter().all(|d| d.doc.identifiers().contains("a")));
    }

    #[test]
    fn test_chained_identifiers_form_one_unit() {
        let documents = vec![
            indexed(json!({"http://schema.org/identifier": ["a", "b"]})),
            indexed(json!({"http://schema.org/identifier": ["c"]})),
            indexed(json!({"http://schema.org/identifier": ["b", "c"]})),
        ];
        assert_eq!(extract_reconcile_units(&documents).len(), 1);
    }

    #[test]
    fn test_sort_puts_missing_timestamps_last() {
        let old = indexed(json!({
            "https://core.kg.ebrains.eu/vocab/meta/propertyUpdates": {"k": "2020-01-01T00:00:00Z"}
        }));
        let new = indexed(json!({
            "https://core.kg.ebrains.eu/vocab/meta/propertyUpdates": {"k": "2021-01-01T00:00:00Z"}
        }));
        let none = indexed(json!({"k": 1}));
        let mut docs = vec![&none, &old, &new];
        sort_by_field_change("k", &mut docs);
        assert_eq!(docs[0].id, new.id);
        assert_eq!(docs[1].id, old.id);
        assert_eq!(docs[2].id, none.id);
    }

    #[test]
    fn test_compare_classifies_by_shared_identifiers() {
        let existing = vec![
            indexed(json!({"http://schema.org/identifier": ["a", "b"]})),
            indexed(json!({"http://schema.org/identifier": ["c", "d"]})),
            indexed(json!({"http://schema.org/identifier": ["z"]})),
        ];
        let inferred = |ids: Value| {
            InferredDocument::from_doc(NormalizedDoc::from_value(json!({"http://schema.org/identifier": ids})).unwrap())
        };
        let result = compare_inferred_instances(
            &existing,
            vec![inferred(json!(["a", "b", "c", "d"])), inferred(json!(["new"]))],
        );
        assert_eq!(result.to_be_merged.len(), 1);
        assert_eq!(result.to_be_merged[0].1.len(), 2);
        assert_eq!(result.to_be_inserted.len(), 1);
        assert!(result.to_be_updated.is_empty());
        assert_eq!(result.to_be_removed.len(), 1);
        assert_eq!(result.to_be_removed[0].id, existing[2].id);
    }
}

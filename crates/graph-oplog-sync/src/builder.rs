//! Assembly of classified entities into canonical operations.

use graph_oplog_store::{EntityId, Snapshot, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::classify::{Classification, LiveChanges};
use crate::diff::{attribute_delta, MapEntries, SetElements};
use crate::identity::IdentityResolver;
use crate::resolver::ResolvedAttributeMap;
use crate::stats::DeriveMetrics;
use crate::types::{AttributeDelta, AttributePayload, Operation, StableId, SyncValue};
use crate::watch::{WatchEntry, WatchKind};

/// Builds operations for one commit.
///
/// This is the only place local handles are turned into stable identifiers;
/// nothing it returns carries an [`EntityId`].
pub struct OperationBuilder<'a, R: ?Sized> {
    before: &'a Snapshot,
    after: &'a Snapshot,
    resolver: &'a R,
    metrics: &'a DeriveMetrics,
}

impl<'a, R: IdentityResolver + ?Sized> OperationBuilder<'a, R> {
    pub fn new(
        before: &'a Snapshot,
        after: &'a Snapshot,
        resolver: &'a R,
        metrics: &'a DeriveMetrics,
    ) -> Self {
        Self {
            before,
            after,
            resolver,
            metrics,
        }
    }

    /// Operations for one entity: a single removal, or any of `Move`,
    /// `UpdatePage`, `Update` in that order.
    pub fn build(
        &self,
        resolved: &ResolvedAttributeMap,
        classification: &Classification,
    ) -> Vec<Operation> {
        let entity = resolved.entity();
        match classification {
            Classification::RemovePage => self
                .removal_id(resolved)
                .map(|entity_id| vec![Operation::RemovePage { entity_id }])
                .unwrap_or_default(),
            Classification::Remove => self
                .removal_id(resolved)
                .map(|id| vec![Operation::Remove { entity_ids: vec![id] }])
                .unwrap_or_default(),
            Classification::Live(live) => self.build_live(entity, live),
        }
    }

    fn build_live(&self, entity: EntityId, live: &LiveChanges) -> Vec<Operation> {
        if live.is_empty() {
            return Vec::new();
        }
        let Some(id) = self.resolver.resolve(entity, self.after) else {
            self.exclude(entity);
            return Vec::new();
        };

        let mut ops = Vec::new();
        if live.moved {
            ops.push(Operation::Move {
                entity_ids: vec![id],
            });
        }
        if live.page_updated {
            ops.push(Operation::UpdatePage { entity_id: id });
        }
        let changed = self.changed_attributes(entity, &live.watched);
        if !changed.is_empty() {
            ops.push(Operation::update(id, changed));
        }
        ops
    }

    /// The entity may be gone from the after snapshot, so the identifier is
    /// resolved against the before snapshot. An entity that only existed
    /// inside this commit falls back to its retracted identity fact.
    fn removal_id(&self, resolved: &ResolvedAttributeMap) -> Option<StableId> {
        let entity = resolved.entity();
        let id = self.resolver.resolve(entity, self.before).or_else(|| {
            self.resolver
                .identity_attribute()
                .filter(|_| !self.before.contains(entity))
                .and_then(|attribute| resolved.get(attribute))
                .filter(|fact| fact.is_retraction())
                .and_then(|fact| fact.value.as_uuid())
                .map(StableId)
        });
        if id.is_none() {
            self.exclude(entity);
        }
        id
    }

    fn changed_attributes(
        &self,
        entity: EntityId,
        watched: &[WatchEntry],
    ) -> BTreeMap<String, AttributePayload> {
        let mut changed = BTreeMap::new();
        for entry in watched {
            let attribute = entry.attribute.as_str();
            let payload = match entry.kind {
                WatchKind::Presence => Some(AttributePayload::Refetch),
                WatchKind::Set => {
                    let delta =
                        attribute_delta(&SetElements, self.before, self.after, entity, attribute);
                    self.delta_payload(delta.filter_map(
                        |value| self.sync_value(value, self.after),
                        |value| self.sync_value(value, self.before),
                    ))
                }
                WatchKind::Map => {
                    let delta =
                        attribute_delta(&MapEntries, self.before, self.after, entity, attribute);
                    self.delta_payload(delta.filter_map(
                        |key| Some(SyncValue::String(key)),
                        |key| Some(SyncValue::String(key)),
                    ))
                }
            };
            if let Some(payload) = payload {
                changed.insert(entry.field.clone(), payload);
            }
        }
        changed
    }

    fn delta_payload(&self, delta: AttributeDelta<SyncValue>) -> Option<AttributePayload> {
        (!delta.is_empty()).then_some(AttributePayload::Delta(delta))
    }

    /// Express a stored value the way a peer can understand it. References
    /// without a stable identifier are dropped.
    fn sync_value(&self, value: Value, snapshot: &Snapshot) -> Option<SyncValue> {
        match value {
            Value::Ref(target) => {
                let id = self.resolver.resolve(target, snapshot);
                if id.is_none() {
                    debug!("Dropping reference to {}: no stable identifier", target);
                    self.metrics.record_dropped_reference();
                }
                id.map(SyncValue::Id)
            }
            Value::Uuid(id) => Some(SyncValue::Id(StableId(id))),
            Value::String(s) | Value::Keyword(s) => Some(SyncValue::String(s)),
            Value::Long(n) => Some(SyncValue::Long(n)),
            Value::Bool(b) => Some(SyncValue::Bool(b)),
            Value::Map(map) => Some(SyncValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| self.sync_value(v, snapshot).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    fn exclude(&self, entity: EntityId) {
        debug!("Excluding {} from sync: no stable identifier", entity);
        self.metrics.record_excluded();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::EntityChangeBatch;
    use crate::classify::classify;
    use crate::identity::UuidAttributeResolver;
    use crate::resolver::resolve;
    use crate::watch::WatchList;
    use graph_oplog_config::PageReplacementPolicy;
    use graph_oplog_store::{attrs, CommitReport, MemoryStore, TxMeta, TxOp};
    use uuid::Uuid;

    fn build_with<R: IdentityResolver>(
        report: &CommitReport,
        entity: EntityId,
        resolver: &R,
        metrics: &DeriveMetrics,
    ) -> Vec<Operation> {
        let facts = report
            .facts
            .iter()
            .filter(|f| f.entity == entity)
            .cloned()
            .collect();
        let resolved = resolve(&EntityChangeBatch::from_facts(facts).unwrap());
        let classification = classify(
            &resolved,
            &WatchList::default(),
            PageReplacementPolicy::Remove,
        );
        OperationBuilder::new(&report.before, &report.after, resolver, metrics)
            .build(&resolved, &classification)
    }

    fn build_for(
        report: &CommitReport,
        entity: EntityId,
        metrics: &DeriveMetrics,
    ) -> Vec<Operation> {
        build_with(report, entity, &UuidAttributeResolver::default(), metrics)
    }

    /// Entity carrying both the default identity and a separate sync id.
    fn seed_dual_identity(store: &mut MemoryStore, named: bool) -> (EntityId, Uuid) {
        let entity = store.allocate_entity();
        let sync_id = Uuid::from_u128(2);
        let mut ops = vec![
            TxOp::add(entity, attrs::UUID, Uuid::from_u128(1)),
            TxOp::add(entity, "sync/id", sync_id),
        ];
        if named {
            ops.push(TxOp::add(entity, attrs::NAME, "journal"));
        }
        store.transact(ops, TxMeta::default()).unwrap();
        (entity, sync_id)
    }

    #[test]
    fn test_remove_resolves_against_before_snapshot() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let id = Uuid::new_v4();
        store
            .transact(
                vec![
                    TxOp::add(block, attrs::UUID, id),
                    TxOp::add(block, attrs::CONTENT, "bye"),
                ],
                TxMeta::default(),
            )
            .unwrap();
        let report = store
            .transact(vec![TxOp::retract_entity(block)], TxMeta::default())
            .unwrap();

        let metrics = DeriveMetrics::new();
        let ops = build_for(&report, block, &metrics);
        assert_eq!(
            ops,
            vec![Operation::Remove {
                entity_ids: vec![StableId(id)]
            }]
        );
    }

    #[test]
    fn test_remove_goes_through_injected_resolver() {
        let mut store = MemoryStore::default();
        let (block, sync_id) = seed_dual_identity(&mut store, false);
        let resolver = UuidAttributeResolver::new("sync/id");

        let moved = store
            .transact(vec![TxOp::add(block, attrs::ORDER, "a1")], TxMeta::default())
            .unwrap();
        let removed = store
            .transact(vec![TxOp::retract_entity(block)], TxMeta::default())
            .unwrap();

        let metrics = DeriveMetrics::new();
        assert_eq!(
            build_with(&moved, block, &resolver, &metrics),
            vec![Operation::Move {
                entity_ids: vec![StableId(sync_id)]
            }]
        );
        assert_eq!(
            build_with(&removed, block, &resolver, &metrics),
            vec![Operation::Remove {
                entity_ids: vec![StableId(sync_id)]
            }]
        );
    }

    #[test]
    fn test_remove_page_goes_through_injected_resolver() {
        let mut store = MemoryStore::default();
        let (page, sync_id) = seed_dual_identity(&mut store, true);
        let report = store
            .transact(vec![TxOp::retract_entity(page)], TxMeta::default())
            .unwrap();

        let ops = build_with(
            &report,
            page,
            &UuidAttributeResolver::new("sync/id"),
            &DeriveMetrics::new(),
        );
        assert_eq!(
            ops,
            vec![Operation::RemovePage {
                entity_id: StableId(sync_id)
            }]
        );
    }

    #[test]
    fn test_ineligible_entity_removal_is_excluded() {
        let mut store = MemoryStore::default();
        let (block, _) = seed_dual_identity(&mut store, false);
        let report = store
            .transact(vec![TxOp::retract_entity(block)], TxMeta::default())
            .unwrap();

        let never = |_: EntityId, _: &Snapshot| -> Option<StableId> { None };
        let metrics = DeriveMetrics::new();
        assert!(build_with(&report, block, &never, &metrics).is_empty());
        assert_eq!(metrics.snapshot().entities_excluded, 1);
    }

    #[test]
    fn test_entity_created_and_removed_in_one_commit() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let id = Uuid::new_v4();
        let report = store
            .transact_batch(
                vec![
                    vec![
                        TxOp::add(block, attrs::UUID, id),
                        TxOp::add(block, attrs::CONTENT, "draft"),
                    ],
                    vec![TxOp::retract_entity(block)],
                ],
                TxMeta::default(),
            )
            .unwrap();

        let ops = build_for(&report, block, &DeriveMetrics::new());
        assert_eq!(
            ops,
            vec![Operation::Remove {
                entity_ids: vec![StableId(id)]
            }]
        );
    }

    #[test]
    fn test_unresolvable_tag_is_dropped() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let anonymous_tag = store.allocate_entity();
        let named_tag = store.allocate_entity();
        let named_id = Uuid::new_v4();
        store
            .transact(
                vec![
                    TxOp::add(block, attrs::UUID, Uuid::new_v4()),
                    TxOp::add(named_tag, attrs::UUID, named_id),
                    TxOp::add(anonymous_tag, attrs::CONTENT, "tag without identity"),
                ],
                TxMeta::default(),
            )
            .unwrap();
        let report = store
            .transact(
                vec![
                    TxOp::add(block, attrs::TAGS, anonymous_tag),
                    TxOp::add(block, attrs::TAGS, named_tag),
                ],
                TxMeta::default(),
            )
            .unwrap();

        let metrics = DeriveMetrics::new();
        let ops = build_for(&report, block, &metrics);
        let Operation::Update {
            changed_attributes: Some(changed),
            ..
        } = &ops[0]
        else {
            panic!("expected update, got {:?}", ops);
        };
        let AttributePayload::Delta(tags) = &changed["tags"] else {
            panic!("expected tag delta");
        };
        assert_eq!(
            tags.added,
            [SyncValue::Id(StableId(named_id))].into_iter().collect()
        );
        assert_eq!(metrics.snapshot().dropped_references, 1);
    }

    #[test]
    fn test_live_entity_without_identity_is_excluded() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let report = store
            .transact(vec![TxOp::add(block, attrs::CONTENT, "x")], TxMeta::default())
            .unwrap();

        let metrics = DeriveMetrics::new();
        assert!(build_for(&report, block, &metrics).is_empty());
        assert_eq!(metrics.snapshot().entities_excluded, 1);
    }

    #[test]
    fn test_property_payload_carries_keys() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let mut props = BTreeMap::new();
        props.insert("due".to_string(), Value::from("friday"));
        store
            .transact(
                vec![
                    TxOp::add(block, attrs::UUID, Uuid::new_v4()),
                    TxOp::add(block, attrs::PROPERTIES, Value::Map(props.clone())),
                ],
                TxMeta::default(),
            )
            .unwrap();
        props.insert("due".to_string(), Value::from("monday"));
        let report = store
            .transact(
                vec![TxOp::add(block, attrs::PROPERTIES, Value::Map(props))],
                TxMeta::default(),
            )
            .unwrap();

        let ops = build_for(&report, block, &DeriveMetrics::new());
        let json = serde_json::to_value(&ops).unwrap();
        assert_eq!(
            json[0]["changed_attributes"]["properties"],
            serde_json::json!({"added": ["due"], "retracted": []})
        );
    }
}

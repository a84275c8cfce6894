//! Reference in-memory fact store with commit notification.
//!
//! This is a small append-and-replace store good enough to drive the sync
//! engine end-to-end. It keeps one immutable [`Snapshot`] per committed state
//! and hands observers the before/after pair together with the facts the
//! commit produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::schema::{Cardinality, Schema};
use crate::snapshot::{EntityAttributes, Snapshot};
use crate::types::{Attribute, EntityId, Fact, TxId, Value};

/// A single mutation requested by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TxOp {
    Add {
        entity: EntityId,
        attribute: Attribute,
        value: Value,
    },
    Retract {
        entity: EntityId,
        attribute: Attribute,
        value: Value,
    },
    /// Retract every value of one attribute.
    RetractAttribute {
        entity: EntityId,
        attribute: Attribute,
    },
    /// Retract every attribute of an entity and every reference to it.
    RetractEntity { entity: EntityId },
}

impl TxOp {
    pub fn add(entity: EntityId, attribute: impl Into<Attribute>, value: impl Into<Value>) -> Self {
        TxOp::Add {
            entity,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn retract(
        entity: EntityId,
        attribute: impl Into<Attribute>,
        value: impl Into<Value>,
    ) -> Self {
        TxOp::Retract {
            entity,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn retract_attribute(entity: EntityId, attribute: impl Into<Attribute>) -> Self {
        TxOp::RetractAttribute {
            entity,
            attribute: attribute.into(),
        }
    }

    pub fn retract_entity(entity: EntityId) -> Self {
        TxOp::RetractEntity { entity }
    }

    fn entity(&self) -> EntityId {
        match self {
            TxOp::Add { entity, .. }
            | TxOp::Retract { entity, .. }
            | TxOp::RetractAttribute { entity, .. }
            | TxOp::RetractEntity { entity } => *entity,
        }
    }
}

/// Per-commit metadata supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxMeta {
    /// Commits flagged here must not be replicated to peers.
    #[serde(default)]
    pub suppress_sync: bool,
    #[serde(default = "Utc::now")]
    pub committed_at: DateTime<Utc>,
    /// Free-form origin label for logs.
    #[serde(default)]
    pub source: Option<String>,
}

impl Default for TxMeta {
    fn default() -> Self {
        Self {
            suppress_sync: false,
            committed_at: Utc::now(),
            source: None,
        }
    }
}

impl TxMeta {
    pub fn suppressed() -> Self {
        Self {
            suppress_sync: true,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Everything an observer learns about one commit.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub before: Arc<Snapshot>,
    pub after: Arc<Snapshot>,
    /// Facts in the order the store produced them.
    pub facts: Vec<Fact>,
    pub tx_ids: Vec<TxId>,
    pub meta: TxMeta,
}

impl CommitReport {
    pub fn max_tx(&self) -> Option<TxId> {
        self.tx_ids.iter().max().copied()
    }
}

/// Receives a [`CommitReport`] after every successful commit.
pub trait CommitObserver: Send + Sync {
    fn on_commit(&self, report: &CommitReport);
}

/// In-memory store holding the current snapshot and registered observers.
pub struct MemoryStore {
    schema: Arc<Schema>,
    current: Arc<Snapshot>,
    next_entity: u64,
    next_tx: u64,
    observers: Vec<Arc<dyn CommitObserver>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Schema::outliner())
    }
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        let schema = Arc::new(schema);
        Self {
            current: Arc::new(Snapshot::empty(schema.clone())),
            schema,
            next_entity: 1,
            next_tx: 1,
            observers: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current committed state.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.clone()
    }

    /// Hand out a fresh local entity handle.
    pub fn allocate_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity = self.next_entity.saturating_add(1);
        id
    }

    pub fn register_observer(&mut self, observer: Arc<dyn CommitObserver>) {
        self.observers.push(observer);
    }

    /// Apply one transaction and notify observers.
    pub fn transact(&mut self, ops: Vec<TxOp>, meta: TxMeta) -> Result<CommitReport> {
        self.transact_batch(vec![ops], meta)
    }

    /// Apply several transactions as one commit.
    ///
    /// Each group gets its own transaction id, but observers are notified
    /// once with the combined facts.
    pub fn transact_batch(&mut self, groups: Vec<Vec<TxOp>>, meta: TxMeta) -> Result<CommitReport> {
        if groups.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut working = self.current.entities().clone();
        let mut facts = Vec::new();
        let mut tx_ids = Vec::with_capacity(groups.len());
        let mut next_tx = self.next_tx;
        let mut next_entity = self.next_entity;

        for ops in groups {
            let tx = TxId(next_tx);
            next_tx += 1;
            tx_ids.push(tx);
            for op in ops {
                let entity = op.entity();
                let following = entity
                    .0
                    .checked_add(1)
                    .ok_or(StoreError::EntityOutOfRange(entity))?;
                next_entity = next_entity.max(following);
                apply_op(&self.schema, &mut working, op, tx, &mut facts)?;
            }
        }

        let before = self.current.clone();
        let after = Arc::new(Snapshot::from_parts(self.schema.clone(), working));
        self.current = after.clone();
        self.next_tx = next_tx;
        self.next_entity = next_entity;

        debug!(
            "Committed {} transaction(s) with {} fact(s), suppress_sync={}",
            tx_ids.len(),
            facts.len(),
            meta.suppress_sync
        );

        let report = CommitReport {
            before,
            after,
            facts,
            tx_ids,
            meta,
        };
        for observer in &self.observers {
            observer.on_commit(&report);
        }
        Ok(report)
    }
}

type Entities = BTreeMap<EntityId, EntityAttributes>;

fn apply_op(
    schema: &Schema,
    working: &mut Entities,
    op: TxOp,
    tx: TxId,
    facts: &mut Vec<Fact>,
) -> Result<()> {
    match op {
        TxOp::Add {
            entity,
            attribute,
            value,
        } => add_value(schema, working, entity, attribute, value, tx, facts),
        TxOp::Retract {
            entity,
            attribute,
            value,
        } => {
            if remove_value(working, entity, &attribute, &value) {
                facts.push(Fact::new(entity, attribute, value, tx, false));
            }
            Ok(())
        }
        TxOp::RetractAttribute { entity, attribute } => {
            for value in take_attribute(working, entity, &attribute) {
                facts.push(Fact::new(entity, attribute.clone(), value, tx, false));
            }
            Ok(())
        }
        TxOp::RetractEntity { entity } => {
            if let Some(attributes) = working.remove(&entity) {
                for (attribute, values) in attributes {
                    for value in values {
                        facts.push(Fact::new(entity, attribute.clone(), value, tx, false));
                    }
                }
            }
            retract_inbound_refs(schema, working, entity, tx, facts);
            Ok(())
        }
    }
}

fn add_value(
    schema: &Schema,
    working: &mut Entities,
    entity: EntityId,
    attribute: Attribute,
    value: Value,
    tx: TxId,
    facts: &mut Vec<Fact>,
) -> Result<()> {
    let entry = schema.get(attribute.as_str());
    if !entry.value_type.accepts(&value) {
        return Err(StoreError::TypeMismatch {
            attribute,
            expected: entry.value_type,
            found: value.type_name(),
        });
    }
    if entry.unique {
        let holder = working.iter().find_map(|(id, attrs)| {
            (*id != entity && attrs.get(&attribute).is_some_and(|v| v.contains(&value)))
                .then_some(*id)
        });
        if let Some(holder) = holder {
            return Err(StoreError::UniqueConflict {
                attribute,
                value: format!("{:?}", value),
                holder,
            });
        }
    }

    let values = working
        .entry(entity)
        .or_default()
        .entry(attribute.clone())
        .or_default();
    if values.contains(&value) {
        return Ok(());
    }
    if entry.cardinality == Cardinality::One {
        for old in std::mem::take(values) {
            facts.push(Fact::new(entity, attribute.clone(), old, tx, false));
        }
    }
    values.insert(value.clone());
    facts.push(Fact::new(entity, attribute, value, tx, true));
    Ok(())
}

fn remove_value(
    working: &mut Entities,
    entity: EntityId,
    attribute: &Attribute,
    value: &Value,
) -> bool {
    let Some(attributes) = working.get_mut(&entity) else {
        return false;
    };
    let removed = attributes
        .get_mut(attribute)
        .is_some_and(|values| values.remove(value));
    prune(working, entity, attribute);
    removed
}

fn take_attribute(working: &mut Entities, entity: EntityId, attribute: &Attribute) -> Vec<Value> {
    let values = working
        .get_mut(&entity)
        .and_then(|attributes| attributes.remove(attribute))
        .map(|values| values.into_iter().collect())
        .unwrap_or_default();
    prune(working, entity, attribute);
    values
}

fn retract_inbound_refs(
    schema: &Schema,
    working: &mut Entities,
    target: EntityId,
    tx: TxId,
    facts: &mut Vec<Fact>,
) {
    let holders: Vec<(EntityId, Attribute)> = working
        .iter()
        .flat_map(|(id, attributes)| {
            attributes
                .iter()
                .filter(|(attribute, _)| schema.may_reference(attribute.as_str()))
                .filter(|(_, values)| values.iter().any(|v| v.as_ref_id() == Some(target)))
                .map(move |(attribute, _)| (*id, attribute.clone()))
        })
        .collect();

    let reference = Value::Ref(target);
    for (holder, attribute) in holders {
        if remove_value(working, holder, &attribute, &reference) {
            facts.push(Fact::new(holder, attribute, reference.clone(), tx, false));
        }
    }
}

fn prune(working: &mut Entities, entity: EntityId, attribute: &Attribute) {
    if let Some(attributes) = working.get_mut(&entity) {
        if attributes.get(attribute).is_some_and(|values| values.is_empty()) {
            attributes.remove(attribute);
        }
        if attributes.is_empty() {
            working.remove(&entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attrs;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        reports: Mutex<Vec<CommitReport>>,
    }

    impl CommitObserver for Recorder {
        fn on_commit(&self, report: &CommitReport) {
            self.reports.lock().unwrap().push(report.clone());
        }
    }

    #[test]
    fn test_cardinality_one_replacement_emits_retract_then_add() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let p1 = store.allocate_entity();
        let p2 = store.allocate_entity();

        store
            .transact(vec![TxOp::add(block, attrs::PARENT, p1)], TxMeta::default())
            .unwrap();
        let report = store
            .transact(vec![TxOp::add(block, attrs::PARENT, p2)], TxMeta::default())
            .unwrap();

        assert_eq!(report.facts.len(), 2);
        assert!(!report.facts[0].added);
        assert_eq!(report.facts[0].value, Value::Ref(p1));
        assert!(report.facts[1].added);
        assert_eq!(report.facts[0].tx, report.facts[1].tx);
        assert_eq!(report.before.value(block, attrs::PARENT), Some(&Value::Ref(p1)));
        assert_eq!(report.after.value(block, attrs::PARENT), Some(&Value::Ref(p2)));
    }

    #[test]
    fn test_redundant_assertion_emits_nothing() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        store
            .transact(vec![TxOp::add(block, attrs::CONTENT, "hi")], TxMeta::default())
            .unwrap();
        let report = store
            .transact(vec![TxOp::add(block, attrs::CONTENT, "hi")], TxMeta::default())
            .unwrap();
        assert!(report.facts.is_empty());
    }

    #[test]
    fn test_retract_entity_removes_inbound_refs() {
        let mut store = MemoryStore::default();
        let tag = store.allocate_entity();
        let block = store.allocate_entity();
        store
            .transact(
                vec![
                    TxOp::add(tag, attrs::UUID, Uuid::new_v4()),
                    TxOp::add(block, attrs::TAGS, tag),
                ],
                TxMeta::default(),
            )
            .unwrap();

        let report = store
            .transact(vec![TxOp::retract_entity(tag)], TxMeta::default())
            .unwrap();

        assert!(!report.after.contains(tag));
        assert!(report
            .facts
            .iter()
            .any(|f| f.entity == block && f.attribute == attrs::TAGS && !f.added));
        assert!(!report.after.contains(block));
    }

    #[test]
    fn test_batch_assigns_distinct_tx_ids() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let report = store
            .transact_batch(
                vec![
                    vec![TxOp::add(block, attrs::CONTENT, "a")],
                    vec![TxOp::add(block, attrs::CONTENT, "b")],
                ],
                TxMeta::default(),
            )
            .unwrap();

        assert_eq!(report.tx_ids.len(), 2);
        assert_eq!(report.max_tx(), Some(report.tx_ids[1]));
        let txs: Vec<_> = report.facts.iter().map(|f| f.tx).collect();
        assert_eq!(txs[0], report.tx_ids[0]);
        assert_eq!(*txs.last().unwrap(), report.tx_ids[1]);
    }

    #[test]
    fn test_failed_transaction_leaves_store_untouched() {
        let mut store = MemoryStore::default();
        let recorder = Arc::new(Recorder::default());
        store.register_observer(recorder.clone());
        let block = store.allocate_entity();

        let err = store
            .transact(
                vec![
                    TxOp::add(block, attrs::CONTENT, "ok"),
                    TxOp::add(block, attrs::PARENT, "not a ref"),
                ],
                TxMeta::default(),
            )
            .unwrap_err();

        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert!(!store.snapshot().contains(block));
        assert!(recorder.reports.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unique_identity_conflict() {
        let mut store = MemoryStore::default();
        let id = Uuid::new_v4();
        let a = store.allocate_entity();
        let b = store.allocate_entity();
        store
            .transact(vec![TxOp::add(a, attrs::UUID, id)], TxMeta::default())
            .unwrap();
        let err = store
            .transact(vec![TxOp::add(b, attrs::UUID, id)], TxMeta::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueConflict { holder, .. } if holder == a));
    }

    #[test]
    fn test_observers_notified_once_per_commit() {
        let mut store = MemoryStore::default();
        let recorder = Arc::new(Recorder::default());
        store.register_observer(recorder.clone());
        let block = store.allocate_entity();

        store
            .transact_batch(
                vec![
                    vec![TxOp::add(block, attrs::CONTENT, "a")],
                    vec![TxOp::add(block, attrs::ORDER, "a0")],
                ],
                TxMeta::suppressed(),
            )
            .unwrap();

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].meta.suppress_sync);
    }

    #[test]
    fn test_explicit_entity_ids_bump_allocator() {
        let mut store = MemoryStore::default();
        store
            .transact(
                vec![TxOp::add(EntityId(40), attrs::CONTENT, "x")],
                TxMeta::default(),
            )
            .unwrap();
        assert_eq!(store.allocate_entity(), EntityId(41));
    }

    #[test]
    fn test_highest_entity_id_is_rejected() {
        let mut store = MemoryStore::default();
        let recorder = Arc::new(Recorder::default());
        store.register_observer(recorder.clone());

        let err = store
            .transact(
                vec![TxOp::add(EntityId(u64::MAX), attrs::CONTENT, "x")],
                TxMeta::default(),
            )
            .unwrap_err();

        assert!(matches!(err, StoreError::EntityOutOfRange(EntityId(u64::MAX))));
        assert!(recorder.reports.lock().unwrap().is_empty());
        assert_eq!(store.allocate_entity(), EntityId(1));
    }

    #[test]
    fn test_allocator_saturates_near_limit() {
        let mut store = MemoryStore::default();
        store
            .transact(
                vec![TxOp::add(EntityId(u64::MAX - 1), attrs::CONTENT, "x")],
                TxMeta::default(),
            )
            .unwrap();
        assert_eq!(store.allocate_entity(), EntityId(u64::MAX));
        assert_eq!(store.allocate_entity(), EntityId(u64::MAX));
    }

    #[test]
    fn test_retract_entity_clears_refs_in_untyped_attributes() {
        let mut store = MemoryStore::default();
        let page = store.allocate_entity();
        let block = store.allocate_entity();
        store
            .transact(
                vec![
                    TxOp::add(page, attrs::NAME, "inbox"),
                    TxOp::add(block, attrs::PARENT, page),
                    TxOp::add(block, attrs::TYPE, page),
                    TxOp::add(block, attrs::ORDER, "a0"),
                ],
                TxMeta::default(),
            )
            .unwrap();

        let report = store
            .transact(vec![TxOp::retract_entity(page)], TxMeta::default())
            .unwrap();

        let inbound: Vec<_> = report.facts.iter().filter(|f| f.entity == block).collect();
        assert_eq!(inbound.len(), 2);
        assert!(inbound.iter().all(|f| f.is_retraction()));
        assert_eq!(report.after.value(block, attrs::ORDER), Some(&Value::from("a0")));
    }
}

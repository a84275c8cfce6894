//! Last-write-wins collapse of a batch to one fact per attribute.

use graph_oplog_store::{Attribute, EntityId, Fact};
use std::collections::BTreeMap;

use crate::batch::EntityChangeBatch;

/// The surviving fact for every attribute a batch touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttributeMap {
    entity: EntityId,
    entries: BTreeMap<Attribute, Fact>,
}

impl ResolvedAttributeMap {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn get(&self, attribute: &str) -> Option<&Fact> {
        self.entries.get(attribute)
    }

    /// Whether any fact in the batch named `attribute`.
    pub fn touched(&self, attribute: &str) -> bool {
        self.entries.contains_key(attribute)
    }

    /// The surviving fact for `attribute` is an assertion.
    pub fn added(&self, attribute: &str) -> bool {
        self.get(attribute).is_some_and(|f| f.added)
    }

    /// The surviving fact for `attribute` is a retraction.
    pub fn retracted(&self, attribute: &str) -> bool {
        self.get(attribute).is_some_and(Fact::is_retraction)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keep, per attribute, the fact with the highest transaction id.
///
/// Equal transaction ids go to the fact that comes later in the batch, so a
/// cardinality-one replacement (retract old, add new, same tx) resolves to
/// the addition.
pub fn resolve(batch: &EntityChangeBatch) -> ResolvedAttributeMap {
    let mut entries: BTreeMap<Attribute, Fact> = BTreeMap::new();
    for fact in batch.facts() {
        match entries.get(&fact.attribute) {
            Some(current) if current.tx > fact.tx => {}
            _ => {
                entries.insert(fact.attribute.clone(), fact.clone());
            }
        }
    }

    ResolvedAttributeMap {
        entity: batch.entity(),
        entries,
    }
}

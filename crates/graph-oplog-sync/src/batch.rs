//! Partitioning of a commit's facts into per-entity batches.

use graph_oplog_store::{EntityId, Fact};
use std::collections::HashMap;

use crate::error::{DeriveError, Result};

/// All facts one commit produced for a single entity, in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityChangeBatch {
    entity: EntityId,
    facts: Vec<Fact>,
}

impl EntityChangeBatch {
    /// Build a batch from caller-grouped facts, checking that they all name
    /// the same entity.
    pub fn from_facts(facts: Vec<Fact>) -> Result<Self> {
        let entity = facts.first().map(|f| f.entity).ok_or(DeriveError::EmptyBatch)?;
        if let Some(stray) = facts.iter().find(|f| f.entity != entity) {
            return Err(DeriveError::MalformedBatch {
                expected: entity,
                found: stray.entity,
            });
        }
        Ok(Self { entity, facts })
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Group facts by entity, in the order entities first appear.
///
/// Nothing is dropped or deduplicated.
pub fn group_facts(facts: &[Fact]) -> Vec<EntityChangeBatch> {
    let mut batches: Vec<EntityChangeBatch> = Vec::new();
    let mut index: HashMap<EntityId, usize> = HashMap::new();

    for fact in facts {
        let slot = *index.entry(fact.entity).or_insert_with(|| {
            batches.push(EntityChangeBatch {
                entity: fact.entity,
                facts: Vec::new(),
            });
            batches.len() - 1
        });
        batches[slot].facts.push(fact.clone());
    }

    batches
}

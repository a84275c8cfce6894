//! Immutable point-in-time views of the database.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::schema::Schema;
use crate::types::{Attribute, EntityId, Value};

pub(crate) type EntityAttributes = BTreeMap<Attribute, BTreeSet<Value>>;

/// Read-only projection of the database at one point in time.
///
/// Every attribute is stored as a set of values; cardinality-one attributes
/// simply hold at most one element.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    schema: Arc<Schema>,
    entities: BTreeMap<EntityId, EntityAttributes>,
}

impl Snapshot {
    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            entities: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        entities: BTreeMap<EntityId, EntityAttributes>,
    ) -> Self {
        Self { schema, entities }
    }

    pub(crate) fn entities(&self) -> &BTreeMap<EntityId, EntityAttributes> {
        &self.entities
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All values of `attribute` on `entity`.
    pub fn values(&self, entity: EntityId, attribute: &str) -> Option<&BTreeSet<Value>> {
        self.entities
            .get(&entity)
            .and_then(|attrs| attrs.get(attribute))
            .filter(|values| !values.is_empty())
    }

    /// The value of a cardinality-one attribute.
    pub fn value(&self, entity: EntityId, attribute: &str) -> Option<&Value> {
        self.values(entity, attribute)
            .and_then(|values| values.iter().next())
    }

    /// Collection view of an attribute; empty when unset.
    pub fn value_set(&self, entity: EntityId, attribute: &str) -> BTreeSet<Value> {
        self.values(entity, attribute).cloned().unwrap_or_default()
    }

    /// Mapping view of a map-valued attribute; `None` when unset or not a map.
    pub fn value_map(&self, entity: EntityId, attribute: &str) -> Option<&BTreeMap<String, Value>> {
        self.value(entity, attribute).and_then(Value::as_map)
    }
}

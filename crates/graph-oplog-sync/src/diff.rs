//! Snapshot-based deltas for collection- and map-valued attributes.
//!
//! Raw facts are not trusted here: a commit may touch a collection several
//! times, and only the net difference between the two snapshots matters.
//! Set and map attributes share [`diff_by_key`]; they differ only in how
//! elements are pulled out of a snapshot and projected to keys.

use graph_oplog_store::{EntityId, Snapshot, Value};
use std::collections::BTreeSet;

use crate::types::AttributeDelta;

/// Pulls comparable elements for one attribute out of a snapshot.
pub trait ElementSource {
    type Element: Ord;
    type Key: Ord;

    fn elements(&self, snapshot: &Snapshot, entity: EntityId, attribute: &str)
        -> BTreeSet<Self::Element>;

    fn key(&self, element: &Self::Element) -> Self::Key;
}

/// Values of a cardinality-many attribute; each value is its own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetElements;

impl ElementSource for SetElements {
    type Element = Value;
    type Key = Value;

    fn elements(&self, snapshot: &Snapshot, entity: EntityId, attribute: &str) -> BTreeSet<Value> {
        snapshot.value_set(entity, attribute)
    }

    fn key(&self, element: &Value) -> Value {
        element.clone()
    }
}

/// Entries of a map-valued attribute, keyed by map key.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapEntries;

impl ElementSource for MapEntries {
    type Element = (String, Value);
    type Key = String;

    fn elements(
        &self,
        snapshot: &Snapshot,
        entity: EntityId,
        attribute: &str,
    ) -> BTreeSet<(String, Value)> {
        snapshot
            .value_map(entity, attribute)
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn key(&self, element: &(String, Value)) -> String {
        element.0.clone()
    }
}

/// Keys of elements only in `after` are added; keys of elements only in
/// `before` are retracted unless they were also added.
pub fn diff_by_key<E, K>(
    before: &BTreeSet<E>,
    after: &BTreeSet<E>,
    key: impl Fn(&E) -> K,
) -> AttributeDelta<K>
where
    E: Ord,
    K: Ord,
{
    let added: BTreeSet<K> = after.difference(before).map(&key).collect();
    let retracted: BTreeSet<K> = before
        .difference(after)
        .map(&key)
        .filter(|k| !added.contains(k))
        .collect();
    AttributeDelta { added, retracted }
}

/// Net change of `attribute` on `entity` between two snapshots.
pub fn attribute_delta<S: ElementSource>(
    source: &S,
    before: &Snapshot,
    after: &Snapshot,
    entity: EntityId,
    attribute: &str,
) -> AttributeDelta<S::Key> {
    let old = source.elements(before, entity, attribute);
    let new = source.elements(after, entity, attribute);
    diff_by_key(&old, &new, |element| source.key(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_oplog_store::{attrs, MemoryStore, TxMeta, TxOp};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn set(values: &[i64]) -> BTreeSet<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_set_diff() {
        let delta = diff_by_key(&set(&[1, 2, 3]), &set(&[2, 3, 4]), |n| *n);
        assert_eq!(delta.added, set(&[4]));
        assert_eq!(delta.retracted, set(&[1]));
    }

    #[test]
    fn test_no_change_is_empty() {
        let delta = diff_by_key(&set(&[1, 2]), &set(&[1, 2]), |n| *n);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_changed_map_value_is_addition_only() {
        let before: BTreeSet<(String, i64)> =
            [("due".to_string(), 1), ("owner".to_string(), 5)].into_iter().collect();
        let after: BTreeSet<(String, i64)> =
            [("due".to_string(), 2), ("status".to_string(), 0)].into_iter().collect();

        let delta = diff_by_key(&before, &after, |(k, _)| k.clone());
        assert_eq!(
            delta.added,
            ["due".to_string(), "status".to_string()].into_iter().collect()
        );
        assert_eq!(delta.retracted, ["owner".to_string()].into_iter().collect());
    }

    #[test]
    fn test_snapshot_sources() {
        let mut store = MemoryStore::default();
        let block = store.allocate_entity();
        let t1 = store.allocate_entity();
        let t2 = store.allocate_entity();

        let mut props = BTreeMap::new();
        props.insert("due".to_string(), Value::from("monday"));
        store
            .transact(
                vec![
                    TxOp::add(block, attrs::TAGS, t1),
                    TxOp::add(block, attrs::PROPERTIES, Value::Map(props)),
                ],
                TxMeta::default(),
            )
            .unwrap();

        let mut props = BTreeMap::new();
        props.insert("status".to_string(), Value::from("done"));
        let report = store
            .transact(
                vec![
                    TxOp::retract(block, attrs::TAGS, t1),
                    TxOp::add(block, attrs::TAGS, t2),
                    TxOp::add(block, attrs::PROPERTIES, Value::Map(props)),
                ],
                TxMeta::default(),
            )
            .unwrap();

        let tags = attribute_delta(&SetElements, &report.before, &report.after, block, attrs::TAGS);
        assert_eq!(tags.added, [Value::Ref(t2)].into_iter().collect());
        assert_eq!(tags.retracted, [Value::Ref(t1)].into_iter().collect());

        let props = attribute_delta(
            &MapEntries,
            &report.before,
            &report.after,
            block,
            attrs::PROPERTIES,
        );
        assert_eq!(props.added, ["status".to_string()].into_iter().collect());
        assert_eq!(props.retracted, ["due".to_string()].into_iter().collect());
    }

    proptest! {
        #[test]
        fn prop_set_delta_is_disjoint(
            before in prop::collection::btree_set(0i64..16, 0..10),
            after in prop::collection::btree_set(0i64..16, 0..10),
        ) {
            let delta = diff_by_key(&before, &after, |n| *n);
            prop_assert!(delta.is_disjoint());
            for n in &delta.added {
                prop_assert!(after.contains(n) && !before.contains(n));
            }
        }

        #[test]
        fn prop_map_delta_is_disjoint(
            before in prop::collection::btree_map(0u8..8, 0i64..3, 0..8),
            after in prop::collection::btree_map(0u8..8, 0i64..3, 0..8),
        ) {
            let before: BTreeSet<(u8, i64)> = before.into_iter().collect();
            let after: BTreeSet<(u8, i64)> = after.into_iter().collect();
            let delta = diff_by_key(&before, &after, |(k, _)| *k);
            prop_assert!(delta.is_disjoint());
            for k in &delta.retracted {
                prop_assert!(!after.iter().any(|(key, _)| key == k));
            }
        }
    }
}

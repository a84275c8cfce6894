//! Operation data model handed to the sink.

use chrono::{DateTime, Utc};
use graph_oplog_store::TxId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Cross-peer durable identifier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(pub Uuid);

impl StableId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for StableId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A value as a peer sees it: references are already stable identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncValue {
    Id(StableId),
    String(String),
    Long(i64),
    Bool(bool),
    Map(BTreeMap<String, SyncValue>),
}

/// Net change of a collection-valued attribute across one commit.
///
/// `added` and `retracted` never share an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDelta<T: Ord> {
    pub added: BTreeSet<T>,
    pub retracted: BTreeSet<T>,
}

impl<T: Ord> Default for AttributeDelta<T> {
    fn default() -> Self {
        Self {
            added: BTreeSet::new(),
            retracted: BTreeSet::new(),
        }
    }
}

impl<T: Ord> AttributeDelta<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.retracted.is_empty()
    }

    pub fn is_disjoint(&self) -> bool {
        self.added.is_disjoint(&self.retracted)
    }

    /// Convert every element, dropping the ones `f` cannot express.
    pub fn filter_map<U: Ord>(
        self,
        mut added: impl FnMut(T) -> Option<U>,
        mut retracted: impl FnMut(T) -> Option<U>,
    ) -> AttributeDelta<U> {
        AttributeDelta {
            added: self.added.into_iter().filter_map(&mut added).collect(),
            retracted: self.retracted.into_iter().filter_map(&mut retracted).collect(),
        }
    }
}

/// Payload of one changed attribute inside an [`Operation::Update`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributePayload {
    Delta(AttributeDelta<SyncValue>),
    /// Serialized as `null`: the peer should re-fetch the current value.
    Refetch,
}

/// A semantic, entity-level change for a collaboration peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    Move {
        entity_ids: Vec<StableId>,
    },
    Update {
        entity_id: StableId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        changed_attributes: Option<BTreeMap<String, AttributePayload>>,
    },
    UpdatePage {
        entity_id: StableId,
    },
    Remove {
        entity_ids: Vec<StableId>,
    },
    RemovePage {
        entity_id: StableId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Move,
    Update,
    UpdatePage,
    Remove,
    RemovePage,
}

impl Operation {
    /// Build an `Update`, leaving `changed_attributes` out when empty.
    pub fn update(entity_id: StableId, changed: BTreeMap<String, AttributePayload>) -> Self {
        Operation::Update {
            entity_id,
            changed_attributes: (!changed.is_empty()).then_some(changed),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Move { .. } => OperationKind::Move,
            Operation::Update { .. } => OperationKind::Update,
            Operation::UpdatePage { .. } => OperationKind::UpdatePage,
            Operation::Remove { .. } => OperationKind::Remove,
            Operation::RemovePage { .. } => OperationKind::RemovePage,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Operation::Remove { .. } | Operation::RemovePage { .. })
    }

    /// Every entity identifier the operation names.
    pub fn entity_ids(&self) -> Vec<StableId> {
        match self {
            Operation::Move { entity_ids } | Operation::Remove { entity_ids } => entity_ids.clone(),
            Operation::Update { entity_id, .. }
            | Operation::UpdatePage { entity_id }
            | Operation::RemovePage { entity_id } => vec![*entity_id],
        }
    }
}

/// Operations derived from one commit, as handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBatch {
    /// Highest transaction id of the commit.
    pub max_tx: Option<TxId>,
    pub committed_at: DateTime<Utc>,
    pub ops: Vec<Operation>,
}

impl OperationBatch {
    pub fn new(max_tx: Option<TxId>, committed_at: DateTime<Utc>, ops: Vec<Operation>) -> Self {
        Self {
            max_tx,
            committed_at,
            ops,
        }
    }
}

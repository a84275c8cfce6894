//! Translation of local entity handles into stable cross-peer identifiers.

use graph_oplog_store::{attrs, Attribute, EntityId, Snapshot};

use crate::types::StableId;

/// Resolves a local handle to the identifier peers know the entity by.
///
/// Implementations must only read from the snapshot they are given; the
/// builder picks the before snapshot for removals and the after snapshot
/// for everything else.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, entity: EntityId, snapshot: &Snapshot) -> Option<StableId>;

    /// Attribute the identifier is read from, when there is one.
    ///
    /// Lets a removal recover the identifier from the retracted fact when the
    /// entity was created and deleted within one commit and so never appears
    /// in the before snapshot.
    fn identity_attribute(&self) -> Option<&str> {
        None
    }
}

impl<F> IdentityResolver for F
where
    F: Fn(EntityId, &Snapshot) -> Option<StableId> + Send + Sync,
{
    fn resolve(&self, entity: EntityId, snapshot: &Snapshot) -> Option<StableId> {
        self(entity, snapshot)
    }
}

/// Reads the identifier from a uuid-valued attribute, `block/uuid` by default.
#[derive(Debug, Clone)]
pub struct UuidAttributeResolver {
    attribute: Attribute,
}

impl Default for UuidAttributeResolver {
    fn default() -> Self {
        Self::new(attrs::UUID)
    }
}

impl UuidAttributeResolver {
    pub fn new(attribute: impl Into<Attribute>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }
}

impl IdentityResolver for UuidAttributeResolver {
    fn resolve(&self, entity: EntityId, snapshot: &Snapshot) -> Option<StableId> {
        snapshot
            .value(entity, self.attribute.as_str())
            .and_then(|value| value.as_uuid())
            .map(StableId)
    }

    fn identity_attribute(&self) -> Option<&str> {
        Some(self.attribute.as_str())
    }
}

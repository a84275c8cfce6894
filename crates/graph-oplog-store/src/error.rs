use crate::types::{Attribute, EntityId};

/// Errors raised while applying a transaction to the reference store.
///
/// A failed transaction leaves the store unchanged and notifies no observer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("attribute {attribute} expects {expected:?} values, got {found}")]
    TypeMismatch {
        attribute: Attribute,
        expected: crate::schema::ValueType,
        found: &'static str,
    },

    #[error("unique attribute {attribute} value {value} already held by {holder}")]
    UniqueConflict {
        attribute: Attribute,
        value: String,
        holder: EntityId,
    },

    #[error("entity id {0} is reserved")]
    EntityOutOfRange(EntityId),

    #[error("transaction batch is empty")]
    EmptyBatch,
}

pub type Result<T> = std::result::Result<T, StoreError>;

//! Core fact types shared by the store and the sync engine.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Process-local entity handle.
///
/// Only meaningful inside one store instance; never sent to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Transaction identifier, monotonically increasing per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Attribute name, e.g. `block/parent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute(String);

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Attribute {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Attribute {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Attribute {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Attribute {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Attribute vocabulary of the outliner schema.
pub mod attrs {
    /// Stable cross-peer identity of a block or page.
    pub const UUID: &str = "block/uuid";
    /// Lower-cased page name; only pages carry it.
    pub const NAME: &str = "block/name";
    /// Page name as the user typed it.
    pub const ORIGINAL_NAME: &str = "block/original-name";
    pub const PARENT: &str = "block/parent";
    pub const ORDER: &str = "block/order";
    pub const PAGE: &str = "block/page";
    pub const CONTENT: &str = "block/content";
    pub const TAGS: &str = "block/tags";
    pub const ALIAS: &str = "block/alias";
    pub const TYPE: &str = "block/type";
    pub const SCHEMA: &str = "block/schema";
    pub const PROPERTIES: &str = "block/properties";
}

/// A value stored against an attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Reference to another entity by local handle.
    Ref(EntityId),
    Uuid(Uuid),
    String(String),
    Keyword(String),
    Long(i64),
    Bool(bool),
    /// Structured mapping, used for property bags.
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_ref_id(&self) -> Option<EntityId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short type label used in validation errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Ref(_) => "ref",
            Value::Uuid(_) => "uuid",
            Value::String(_) => "string",
            Value::Keyword(_) => "keyword",
            Value::Long(_) => "long",
            Value::Bool(_) => "bool",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Value::Ref(id)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A single committed assertion or retraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub entity: EntityId,
    pub attribute: Attribute,
    pub value: Value,
    pub tx: TxId,
    /// `true` for an assertion, `false` for a retraction.
    pub added: bool,
}

impl Fact {
    pub fn new(
        entity: EntityId,
        attribute: impl Into<Attribute>,
        value: Value,
        tx: TxId,
        added: bool,
    ) -> Self {
        Self {
            entity,
            attribute: attribute.into(),
            value,
            tx,
            added,
        }
    }

    pub fn is_retraction(&self) -> bool {
        !self.added
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {:?} {} {}]",
            self.entity,
            self.attribute,
            self.value,
            self.tx,
            if self.added { "add" } else { "retract" }
        )
    }
}

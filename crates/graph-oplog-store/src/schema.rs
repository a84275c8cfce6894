//! Attribute schema: cardinality, value types and uniqueness.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{attrs, Attribute, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Ref,
    Uuid,
    String,
    Keyword,
    Long,
    Bool,
    Map,
    /// No type check.
    #[default]
    Any,
}

impl ValueType {
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueType::Any, _)
                | (ValueType::Ref, Value::Ref(_))
                | (ValueType::Uuid, Value::Uuid(_))
                | (ValueType::String, Value::String(_))
                | (ValueType::Keyword, Value::Keyword(_))
                | (ValueType::Long, Value::Long(_))
                | (ValueType::Bool, Value::Bool(_))
                | (ValueType::Map, Value::Map(_))
        )
    }
}

/// Schema entry for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeSchema {
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub value_type: ValueType,
    /// At most one entity may hold a given value.
    #[serde(default)]
    pub unique: bool,
}

impl AttributeSchema {
    pub fn one(value_type: ValueType) -> Self {
        Self {
            cardinality: Cardinality::One,
            value_type,
            unique: false,
        }
    }

    pub fn many(value_type: ValueType) -> Self {
        Self {
            cardinality: Cardinality::Many,
            value_type,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Attribute schema table. Undeclared attributes are cardinality-one, untyped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    attributes: HashMap<Attribute, AttributeSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of an outliner graph: pages and blocks linked by parent refs.
    pub fn outliner() -> Self {
        Self::new()
            .with(attrs::UUID, AttributeSchema::one(ValueType::Uuid).unique())
            .with(attrs::NAME, AttributeSchema::one(ValueType::String).unique())
            .with(attrs::ORIGINAL_NAME, AttributeSchema::one(ValueType::String))
            .with(attrs::PARENT, AttributeSchema::one(ValueType::Ref))
            .with(attrs::ORDER, AttributeSchema::one(ValueType::String))
            .with(attrs::PAGE, AttributeSchema::one(ValueType::Ref))
            .with(attrs::CONTENT, AttributeSchema::one(ValueType::String))
            .with(attrs::TAGS, AttributeSchema::many(ValueType::Ref))
            .with(attrs::ALIAS, AttributeSchema::many(ValueType::Ref))
            .with(attrs::TYPE, AttributeSchema::many(ValueType::Any))
            .with(attrs::SCHEMA, AttributeSchema::one(ValueType::Map))
            .with(attrs::PROPERTIES, AttributeSchema::one(ValueType::Map))
    }

    pub fn with(mut self, attribute: impl Into<Attribute>, schema: AttributeSchema) -> Self {
        self.attributes.insert(attribute.into(), schema);
        self
    }

    pub fn insert(&mut self, attribute: impl Into<Attribute>, schema: AttributeSchema) {
        self.attributes.insert(attribute.into(), schema);
    }

    pub fn get(&self, attribute: &str) -> AttributeSchema {
        self.attributes.get(attribute).copied().unwrap_or_default()
    }

    pub fn cardinality(&self, attribute: &str) -> Cardinality {
        self.get(attribute).cardinality
    }

    pub fn is_many(&self, attribute: &str) -> bool {
        self.cardinality(attribute) == Cardinality::Many
    }

    /// Whether values of `attribute` can point at another entity.
    pub fn may_reference(&self, attribute: &str) -> bool {
        matches!(self.get(attribute).value_type, ValueType::Ref | ValueType::Any)
    }
}

use crate::core::Value;
use crate::schema::Cardinality;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a record inside one store file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipValue {
    ToOne(Option<RecordId>),
    ToMany(BTreeSet<RecordId>),
}

impl RelationshipValue {
    pub fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::ToOne => Self::ToOne(None),
            Cardinality::ToMany => Self::ToMany(BTreeSet::new()),
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::ToOne(_) => Cardinality::ToOne,
            Self::ToMany(_) => Cardinality::ToMany,
        }
    }

    pub fn targets(&self) -> Vec<RecordId> {
        match self {
            Self::ToOne(target) => target.iter().copied().collect(),
            Self::ToMany(targets) => targets.iter().copied().collect(),
        }
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        match self {
            Self::ToOne(target) => target.as_ref() == Some(id),
            Self::ToMany(targets) => targets.contains(id),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::ToOne(target) => usize::from(target.is_some()),
            Self::ToMany(targets) => targets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a target; a to-one value is overwritten.
    pub fn add(&mut self, id: RecordId) {
        match self {
            Self::ToOne(target) => *target = Some(id),
            Self::ToMany(targets) => {
                targets.insert(id);
            }
        }
    }

    pub fn remove(&mut self, id: &RecordId) {
        match self {
            Self::ToOne(target) => {
                if target.as_ref() == Some(id) {
                    *target = None;
                }
            }
            Self::ToMany(targets) => {
                targets.remove(id);
            }
        }
    }
}

/// A generic entity instance: an attribute bag plus a relationship bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entity: String,
    pub attributes: BTreeMap<String, Value>,
    pub relationships: BTreeMap<String, RelationshipValue>,
}

impl Record {
    pub fn new(id: RecordId, entity: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipValue> {
        self.relationships.get(name)
    }

    /// The to-one target of `name`, if any.
    pub fn to_one(&self, name: &str) -> Option<RecordId> {
        match self.relationships.get(name) {
            Some(RelationshipValue::ToOne(target)) => *target,
            _ => None,
        }
    }

    pub fn related(&self, name: &str) -> Vec<RecordId> {
        self.relationships
            .get(name)
            .map(RelationshipValue::targets)
            .unwrap_or_default()
    }
}

//! Schema versions and the entity definitions they are made of.
//!
//! A [`SchemaVersion`] is immutable application input. Its persisted identity is
//! its [`SchemaFingerprint`]: one UUIDv5 per entity, derived from the entity's
//! attribute and relationship layout. Store files record the fingerprint they
//! were written under, which is how a store is matched back to a version.

use crate::core::{DataType, Result, Value, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Namespace for entity fingerprints.
const FINGERPRINT_NAMESPACE: Uuid = Uuid::from_u128(0x6e6f_7465_7661_756c_745f_7363_6865_6d61);

/// Entity name -> entity fingerprint.
pub type SchemaFingerprint = BTreeMap<String, Uuid>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub optional: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

fn default_true() -> bool {
    true
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            optional: true,
            default_value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// The value a freshly inserted instance starts with.
    pub fn initial_value(&self) -> Value {
        self.default_value.clone().unwrap_or(Value::Null)
    }

    pub fn validate(&self, entity: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.optional {
                return Err(VaultError::ConstraintViolation(format!(
                    "Attribute '{}.{}' cannot be NULL",
                    entity, self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(VaultError::TypeMismatch(format!(
                "Attribute '{}.{}' expects type {}, got {}",
                entity,
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub name: String,
    pub target_entity: String,
    pub cardinality: Cardinality,
    #[serde(default = "default_true")]
    pub optional: bool,
    #[serde(default)]
    pub inverse: Option<String>,
}

impl RelationshipDefinition {
    pub fn to_one(name: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_entity: target_entity.into(),
            cardinality: Cardinality::ToOne,
            optional: true,
            inverse: None,
        }
    }

    pub fn to_many(name: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::ToMany,
            ..Self::to_one(name, target_entity)
        }
    }

    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipDefinition) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|rel| rel.name == name)
    }

    /// Sorted, layout-only description. Optionality and defaults are left out
    /// because they do not change what is written to disk.
    pub fn canonical_descriptor(&self) -> String {
        let mut attributes: Vec<String> = self
            .attributes
            .iter()
            .map(|attr| format!("attr:{}:{}", attr.name, attr.data_type))
            .collect();
        attributes.sort();

        let mut relationships: Vec<String> = self
            .relationships
            .iter()
            .map(|rel| format!("rel:{}:{}:{:?}", rel.name, rel.target_entity, rel.cardinality))
            .collect();
        relationships.sort();

        let mut descriptor = format!("entity:{}", self.name);
        for part in attributes.iter().chain(relationships.iter()) {
            descriptor.push('|');
            descriptor.push_str(part);
        }
        descriptor
    }

    pub fn fingerprint(&self) -> Uuid {
        Uuid::new_v5(&FINGERPRINT_NAMESPACE, self.canonical_descriptor().as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub identifier: String,
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
}

impl SchemaVersion {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: EntityDefinition) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn require_entity(&self, name: &str) -> Result<&EntityDefinition> {
        self.entity(name).ok_or_else(|| {
            VaultError::EntityNotFound(format!("{} (schema {})", name, self.identifier))
        })
    }

    pub fn fingerprint(&self) -> SchemaFingerprint {
        self.entities
            .iter()
            .map(|entity| (entity.name.clone(), entity.fingerprint()))
            .collect()
    }

    /// Checks the version is internally consistent.
    ///
    /// Rejects duplicate entity, attribute or relationship names, relationships
    /// pointing at unknown entities, dangling inverses and defaults whose type
    /// does not match the attribute.
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |msg: String| VaultError::InvalidSchema(format!("{}: {}", self.identifier, msg));

        let mut entity_names = HashSet::new();
        for entity in &self.entities {
            if !entity_names.insert(entity.name.as_str()) {
                return Err(invalid(format!("duplicate entity '{}'", entity.name)));
            }

            let mut member_names = HashSet::new();
            for attr in &entity.attributes {
                if !member_names.insert(attr.name.as_str()) {
                    return Err(invalid(format!(
                        "duplicate member '{}.{}'",
                        entity.name, attr.name
                    )));
                }
                if let Some(default) = &attr.default_value {
                    attr.validate(&entity.name, default).map_err(|e| invalid(e.to_string()))?;
                }
            }
            for rel in &entity.relationships {
                if !member_names.insert(rel.name.as_str()) {
                    return Err(invalid(format!("duplicate member '{}.{}'", entity.name, rel.name)));
                }
            }
        }

        for entity in &self.entities {
            for rel in &entity.relationships {
                let Some(target) = self.entity(&rel.target_entity) else {
                    return Err(invalid(format!(
                        "relationship '{}.{}' targets unknown entity '{}'",
                        entity.name, rel.name, rel.target_entity
                    )));
                };
                if let Some(inverse) = &rel.inverse {
                    let back = target.relationship(inverse).ok_or_else(|| {
                        invalid(format!(
                            "inverse '{}.{}' of '{}.{}' does not exist",
                            target.name, inverse, entity.name, rel.name
                        ))
                    })?;
                    if back.target_entity != entity.name {
                        return Err(invalid(format!(
                            "inverse '{}.{}' points at '{}', expected '{}'",
                            target.name, inverse, back.target_entity, entity.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

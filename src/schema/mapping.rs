use super::model::SchemaVersion;
use crate::core::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// `user_info` key that carries the transition tag of an entity mapping.
pub const SOURCE_VERSION_KEY: &str = "sourceVersion";

/// How one source entity becomes one destination entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub name: String,
    pub source_entity: String,
    pub destination_entity: String,
    /// Destination attribute -> source attribute, for attributes that changed name.
    #[serde(default)]
    pub attribute_renames: BTreeMap<String, String>,
    #[serde(default)]
    pub user_info: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub reconstruct_relationships: bool,
}

fn default_true() -> bool {
    true
}

impl EntityMapping {
    pub fn new(source_entity: impl Into<String>, destination_entity: impl Into<String>) -> Self {
        let source_entity = source_entity.into();
        let destination_entity = destination_entity.into();
        Self {
            name: format!("{}To{}", source_entity, destination_entity),
            source_entity,
            destination_entity,
            attribute_renames: BTreeMap::new(),
            user_info: BTreeMap::new(),
            reconstruct_relationships: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rename(
        mut self,
        destination: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.attribute_renames.insert(destination.into(), source.into());
        self
    }

    pub fn with_user_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }

    pub fn with_transition_tag(self, tag: impl Into<String>) -> Self {
        self.with_user_info(SOURCE_VERSION_KEY, tag)
    }

    pub fn without_relationships(mut self) -> Self {
        self.reconstruct_relationships = false;
        self
    }

    pub fn transition_tag(&self) -> Option<&str> {
        self.user_info.get(SOURCE_VERSION_KEY).map(String::as_str)
    }

    /// Name of the source attribute feeding `destination_attribute`.
    pub fn source_attribute_for<'a>(&'a self, destination_attribute: &'a str) -> &'a str {
        self.attribute_renames
            .get(destination_attribute)
            .map(String::as_str)
            .unwrap_or(destination_attribute)
    }
}

/// The declarative correspondence between two schema versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSpecification {
    pub source_schema: String,
    pub destination_schema: String,
    #[serde(default)]
    pub entity_mappings: Vec<EntityMapping>,
}

impl MappingSpecification {
    pub fn new(source_schema: impl Into<String>, destination_schema: impl Into<String>) -> Self {
        Self {
            source_schema: source_schema.into(),
            destination_schema: destination_schema.into(),
            entity_mappings: Vec::new(),
        }
    }

    pub fn with_entity_mapping(mut self, mapping: EntityMapping) -> Self {
        self.entity_mappings.push(mapping);
        self
    }

    pub fn mappings_for_source_entity<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a EntityMapping> {
        self.entity_mappings
            .iter()
            .filter(move |mapping| mapping.source_entity == entity)
    }

    pub fn connects(&self, source: &str, destination: &str) -> bool {
        self.source_schema == source && self.destination_schema == destination
    }

    /// Checks every entity mapping against the two schema versions it joins.
    pub fn validate(&self, source: &SchemaVersion, destination: &SchemaVersion) -> Result<()> {
        let invalid = |msg: String| {
            VaultError::InvalidSchema(format!(
                "mapping {} -> {}: {}",
                self.source_schema, self.destination_schema, msg
            ))
        };

        let mut names = HashSet::new();
        for mapping in &self.entity_mappings {
            if !names.insert(mapping.name.as_str()) {
                return Err(invalid(format!("duplicate entity mapping '{}'", mapping.name)));
            }

            let source_entity = source.entity(&mapping.source_entity).ok_or_else(|| {
                invalid(format!("unknown source entity '{}'", mapping.source_entity))
            })?;
            let destination_entity = destination.entity(&mapping.destination_entity).ok_or_else(|| {
                invalid(format!("unknown destination entity '{}'", mapping.destination_entity))
            })?;

            for (dest_attr, source_attr) in &mapping.attribute_renames {
                if destination_entity.attribute(dest_attr).is_none() {
                    return Err(invalid(format!(
                        "rename target '{}.{}' does not exist",
                        destination_entity.name, dest_attr
                    )));
                }
                if source_entity.attribute(source_attr).is_none() {
                    return Err(invalid(format!(
                        "rename source '{}.{}' does not exist",
                        source_entity.name, source_attr
                    )));
                }
            }
        }

        Ok(())
    }
}

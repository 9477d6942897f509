//! JSON form of a schema registry, for applications that ship their schema
//! chain as a data file rather than building it in code.

use super::mapping::MappingSpecification;
use super::model::SchemaVersion;
use super::registry::SchemaRegistry;
use crate::core::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBundle {
    pub versions: Vec<SchemaVersion>,
    #[serde(default)]
    pub mappings: Vec<MappingSpecification>,
}

impl SchemaBundle {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            VaultError::IoError(format!("Failed to read schema bundle '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn into_registry(self) -> Result<SchemaRegistry> {
        SchemaRegistry::new(self.versions, self.mappings)
    }
}

impl From<&SchemaRegistry> for SchemaBundle {
    fn from(registry: &SchemaRegistry) -> Self {
        Self {
            versions: registry.versions().to_vec(),
            mappings: registry.mappings().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"{
        "versions": [
            {
                "identifier": "v1",
                "entities": [
                    { "name": "Note", "attributes": [ { "name": "title", "data_type": "Text" } ] }
                ]
            },
            {
                "identifier": "v2",
                "entities": [
                    {
                        "name": "Note",
                        "attributes": [
                            { "name": "title", "data_type": "Text" },
                            { "name": "pinned", "data_type": "Boolean", "optional": false,
                              "default_value": { "Boolean": false } }
                        ]
                    }
                ]
            }
        ],
        "mappings": [
            {
                "source_schema": "v1",
                "destination_schema": "v2",
                "entity_mappings": [
                    { "name": "NoteToNote", "source_entity": "Note", "destination_entity": "Note" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_bundle_loads_into_registry() {
        let registry = SchemaBundle::from_json_str(BUNDLE).unwrap().into_registry().unwrap();
        assert_eq!(registry.len(), 2);
        let pinned = registry
            .final_version()
            .entity("Note")
            .and_then(|note| note.attribute("pinned"))
            .unwrap();
        assert!(!pinned.optional);
        assert_eq!(pinned.default_value, Some(crate::core::Value::Boolean(false)));

        let mapping = &registry.mappings()[0].entity_mappings[0];
        assert!(mapping.reconstruct_relationships);
        assert!(mapping.attribute_renames.is_empty());
    }

    #[test]
    fn test_bundle_round_trips_through_json() {
        let bundle = SchemaBundle::from_json_str(BUNDLE).unwrap();
        let json = bundle.to_json_string().unwrap();
        let again = SchemaBundle::from_json_str(&json).unwrap();
        assert_eq!(again.versions, bundle.versions);
        assert_eq!(again.mappings, bundle.mappings);
    }

    #[test]
    fn test_malformed_bundle_is_rejected() {
        assert!(matches!(
            SchemaBundle::from_json_str("{ \"versions\": 3 }"),
            Err(VaultError::Serialization(_))
        ));
    }
}

use super::mapping::MappingSpecification;
use super::model::{SchemaFingerprint, SchemaVersion};
use crate::core::{Result, VaultError};
use std::collections::HashMap;

/// The ordered, read-only set of schema versions bundled with the application,
/// plus the mapping specifications that join them.
///
/// Registration order is the version chain: the last registered version is the
/// final schema every store is migrated towards.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    versions: Vec<SchemaVersion>,
    mappings: Vec<MappingSpecification>,
    positions: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Builds and validates a registry.
    ///
    /// Every mapping must join two registered versions and point forward along
    /// registration order, which bounds any migration to `len() - 1` steps.
    pub fn new(versions: Vec<SchemaVersion>, mappings: Vec<MappingSpecification>) -> Result<Self> {
        if versions.is_empty() {
            return Err(VaultError::InvalidSchema(
                "registry requires at least one schema version".to_string(),
            ));
        }

        let mut positions = HashMap::new();
        let mut fingerprints: Vec<(SchemaFingerprint, &str)> = Vec::new();
        for (idx, version) in versions.iter().enumerate() {
            version.validate()?;
            if positions.insert(version.identifier.clone(), idx).is_some() {
                return Err(VaultError::DuplicateSchema(format!(
                    "identifier '{}' registered twice",
                    version.identifier
                )));
            }
            let fingerprint = version.fingerprint();
            if let Some((_, other)) = fingerprints.iter().find(|(fp, _)| *fp == fingerprint) {
                return Err(VaultError::DuplicateSchema(format!(
                    "'{}' and '{}' have identical layouts",
                    other, version.identifier
                )));
            }
            fingerprints.push((fingerprint, &version.identifier));
        }

        for spec in &mappings {
            let source_idx = *positions
                .get(&spec.source_schema)
                .ok_or_else(|| VaultError::ModelNotFound(spec.source_schema.clone()))?;
            let destination_idx = *positions
                .get(&spec.destination_schema)
                .ok_or_else(|| VaultError::ModelNotFound(spec.destination_schema.clone()))?;
            if destination_idx <= source_idx {
                return Err(VaultError::InvalidSchema(format!(
                    "mapping {} -> {} does not advance the version chain",
                    spec.source_schema, spec.destination_schema
                )));
            }
            spec.validate(&versions[source_idx], &versions[destination_idx])?;
        }

        Ok(Self {
            versions,
            mappings,
            positions,
        })
    }

    pub fn resolve_model(&self, identifier: &str) -> Result<&SchemaVersion> {
        self.positions
            .get(identifier)
            .map(|idx| &self.versions[*idx])
            .ok_or_else(|| VaultError::ModelNotFound(identifier.to_string()))
    }

    pub fn final_version(&self) -> &SchemaVersion {
        // Non-empty by construction.
        &self.versions[self.versions.len() - 1]
    }

    /// The registered version whose layout matches a persisted fingerprint.
    pub fn model_for_fingerprint(&self, fingerprint: &SchemaFingerprint) -> Option<&SchemaVersion> {
        self.versions
            .iter()
            .find(|version| &version.fingerprint() == fingerprint)
    }

    pub fn versions(&self) -> &[SchemaVersion] {
        &self.versions
    }

    pub fn mappings(&self) -> &[MappingSpecification] {
        &self.mappings
    }

    pub fn mappings_between(&self, source: &str, destination: &str) -> Vec<&MappingSpecification> {
        self.mappings
            .iter()
            .filter(|spec| spec.connects(source, destination))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

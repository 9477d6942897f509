use crate::core::{Result, VaultError};
use crate::schema::{MappingSpecification, SchemaRegistry, SchemaVersion};

/// Finds the next step of the version chain for a source schema.
pub struct MappingResolver<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> MappingResolver<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Walks candidate destinations in registration order and collects every
    /// mapping specification leaving `source`.
    ///
    /// Exactly one match is required. Zero is `NoMigrationPath`; more than one
    /// is reported as `AmbiguousMigrationPath` instead of picking the first.
    pub fn resolve(
        &self,
        source: &SchemaVersion,
    ) -> Result<(&'r SchemaVersion, &'r MappingSpecification)> {
        let mut matches = Vec::new();
        for candidate in self.registry.versions() {
            for spec in self
                .registry
                .mappings_between(&source.identifier, &candidate.identifier)
            {
                matches.push((candidate, spec));
            }
        }

        match matches.len() {
            0 => Err(VaultError::NoMigrationPath(source.identifier.clone())),
            1 => Ok(matches[0]),
            _ => Err(VaultError::AmbiguousMigrationPath {
                source_schema: source.identifier.clone(),
                candidates: matches
                    .iter()
                    .map(|(candidate, _)| candidate.identifier.clone())
                    .collect(),
            }),
        }
    }
}

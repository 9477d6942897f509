use super::correlation::CorrelationMap;
use crate::core::{Result, VaultError};
use crate::schema::{EntityMapping, MappingSpecification, SchemaVersion};
use crate::storage::{RecordId, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Instances,
    Relationships,
}

/// Everything a policy may touch during one migration step.
///
/// The source store is read-only. The destination store and the correlation
/// map live only as long as the step; nothing written here is visible outside
/// until the executor hands the finished destination back.
pub struct MigrationContext<'a> {
    spec: &'a MappingSpecification,
    source: &'a RecordStore,
    destination_schema: &'a SchemaVersion,
    destination: RecordStore,
    correlation: CorrelationMap,
    phase: Phase,
}

impl<'a> MigrationContext<'a> {
    pub fn new(
        spec: &'a MappingSpecification,
        source: &'a RecordStore,
        destination_schema: &'a SchemaVersion,
    ) -> Self {
        Self {
            spec,
            source,
            destination_schema,
            destination: RecordStore::new(destination_schema.clone()),
            correlation: CorrelationMap::new(),
            phase: Phase::Instances,
        }
    }

    pub fn spec(&self) -> &'a MappingSpecification {
        self.spec
    }

    pub fn source(&self) -> &'a RecordStore {
        self.source
    }

    pub fn source_schema(&self) -> &'a SchemaVersion {
        self.source.schema()
    }

    pub fn destination_schema(&self) -> &'a SchemaVersion {
        self.destination_schema
    }

    pub fn destination(&self) -> &RecordStore {
        &self.destination
    }

    pub fn destination_mut(&mut self) -> &mut RecordStore {
        &mut self.destination
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Creates a destination instance. Only allowed while instances are being
    /// built: relationship wiring relies on the full instance set existing.
    pub fn insert_destination(&mut self, entity: &str) -> Result<RecordId> {
        if self.phase != Phase::Instances {
            return Err(VaultError::ConstraintViolation(format!(
                "cannot create '{}' instances during the relationship phase",
                entity
            )));
        }
        self.destination.insert_new(entity)
    }

    pub fn associate(
        &mut self,
        mapping: &EntityMapping,
        source: RecordId,
        destination: RecordId,
    ) -> Result<()> {
        let record = self.destination.require(&destination)?;
        if record.entity != mapping.destination_entity {
            return Err(VaultError::TypeMismatch(format!(
                "mapping '{}' produces '{}', cannot associate a '{}'",
                mapping.name, mapping.destination_entity, record.entity
            )));
        }
        self.correlation.associate(&mapping.name, source, destination)
    }

    pub fn destination_instances(&self, mapping: &str, source: &RecordId) -> Vec<RecordId> {
        self.correlation.destination_instances(mapping, source).to_vec()
    }

    pub fn source_instance(&self, mapping: &str, destination: &RecordId) -> Option<RecordId> {
        self.correlation.source_instance(mapping, destination)
    }

    /// Destination counterparts of a source record, across every entity mapping
    /// that consumes the record's entity.
    pub fn resolve_destination(&self, source: &RecordId) -> Result<Vec<RecordId>> {
        let record = self.source.require(source)?;
        let mut resolved = Vec::new();
        for mapping in self.spec.mappings_for_source_entity(&record.entity) {
            resolved
                .extend_from_slice(self.correlation.destination_instances(&mapping.name, source));
        }
        Ok(resolved)
    }

    pub(crate) fn destinations_of(&self, mapping: &str) -> Vec<RecordId> {
        self.correlation.destinations_of(mapping)
    }

    pub(crate) fn begin_relationship_phase(&mut self) {
        self.phase = Phase::Relationships;
    }

    pub(crate) fn finish(self) -> (RecordStore, CorrelationMap) {
        (self.destination, self.correlation)
    }
}

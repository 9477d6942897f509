use super::context::MigrationContext;
use super::policy::PolicyRegistry;
use crate::core::{Result, VaultError};
use crate::schema::{MappingSpecification, SchemaVersion};
use crate::storage::RecordStore;
use tracing::{Level, event, info_span};

/// The finished destination of one step.
#[derive(Debug)]
pub struct StepOutcome {
    pub destination: RecordStore,
    pub associations: usize,
}

/// Runs one mapping specification against a source store.
pub struct MigrationExecutor<'p> {
    policies: &'p PolicyRegistry,
}

impl<'p> MigrationExecutor<'p> {
    pub fn new(policies: &'p PolicyRegistry) -> Self {
        Self { policies }
    }

    /// Builds every destination instance, then wires relationships.
    ///
    /// Phase 2 starts only after phase 1 has finished for all entity mappings,
    /// since a relationship may point across mappings. The destination is
    /// validated against its schema before it is returned; any failure discards
    /// it and surfaces as `MigrationStepFailed`.
    pub fn execute(
        &self,
        spec: &MappingSpecification,
        source: &RecordStore,
        destination_schema: &SchemaVersion,
    ) -> Result<StepOutcome> {
        let span = info_span!(
            "migration_step",
            from = %spec.source_schema,
            to = %spec.destination_schema
        );
        let _guard = span.enter();

        self.run(spec, source, destination_schema).map_err(|err| {
            event!(Level::ERROR, error = %err, "migration step failed");
            err.into_step_failure(&spec.source_schema, &spec.destination_schema)
        })
    }

    fn run(
        &self,
        spec: &MappingSpecification,
        source: &RecordStore,
        destination_schema: &SchemaVersion,
    ) -> Result<StepOutcome> {
        if source.schema().identifier != spec.source_schema {
            return Err(VaultError::ModelNotFound(format!(
                "source store is '{}', mapping expects '{}'",
                source.schema().identifier,
                spec.source_schema
            )));
        }
        if destination_schema.identifier != spec.destination_schema {
            return Err(VaultError::ModelNotFound(format!(
                "destination schema is '{}', mapping expects '{}'",
                destination_schema.identifier, spec.destination_schema
            )));
        }

        let mut ctx = MigrationContext::new(spec, source, destination_schema);

        for mapping in &spec.entity_mappings {
            let policy = self.policies.resolve(mapping);
            let mut migrated = 0usize;
            for record in source.instances_of(&mapping.source_entity) {
                policy.create_destination_instances(record, mapping, &mut ctx)?;
                migrated += 1;
            }
            event!(
                Level::DEBUG,
                mapping = %mapping.name,
                policy = policy.name(),
                instances = migrated,
                "instance phase complete"
            );
        }

        ctx.begin_relationship_phase();

        for mapping in spec
            .entity_mappings
            .iter()
            .filter(|mapping| mapping.reconstruct_relationships)
        {
            let policy = self.policies.resolve(mapping);
            let destinations = ctx.destinations_of(&mapping.name);
            for destination in &destinations {
                policy.create_relationships(*destination, mapping, &mut ctx)?;
            }
            event!(
                Level::DEBUG,
                mapping = %mapping.name,
                policy = policy.name(),
                instances = destinations.len(),
                "relationship phase complete"
            );
        }

        let (destination, correlation) = ctx.finish();
        destination.validate()?;

        event!(
            Level::INFO,
            source_records = source.len(),
            destination_records = destination.len(),
            "migration step built destination store"
        );

        Ok(StepOutcome {
            destination,
            associations: correlation.len(),
        })
    }
}

use super::TransformationPolicy;
use crate::core::{Result, Value, VaultError};
use crate::migration::context::MigrationContext;
use crate::schema::{Cardinality, EntityMapping};
use crate::storage::{Record, RecordId, RelationshipValue};
use std::collections::BTreeSet;

/// Attribute copy plus relationship re-targeting through the correlation map.
///
/// Uses the trait's default phases unchanged.
pub struct GenericPolicy;

impl TransformationPolicy for GenericPolicy {
    fn name(&self) -> &'static str {
        "generic"
    }
}

/// Inserts a destination instance and copies every attribute present on both
/// sides. Attributes only the destination knows keep their declared default.
///
/// The new instance is not associated; callers do that once they are done
/// shaping it.
pub fn copy_instance(
    source: &Record,
    mapping: &EntityMapping,
    ctx: &mut MigrationContext<'_>,
) -> Result<RecordId> {
    let source_definition = ctx.source_schema().require_entity(&mapping.source_entity)?;
    let destination_definition = ctx
        .destination_schema()
        .require_entity(&mapping.destination_entity)?;

    let id = ctx.insert_destination(&mapping.destination_entity)?;
    for attr in &destination_definition.attributes {
        let source_name = mapping.source_attribute_for(&attr.name);
        if source_definition.attribute(source_name).is_none() {
            continue;
        }
        let value = source.attribute(source_name).cloned().unwrap_or(Value::Null);
        ctx.destination_mut().set_attribute(&id, &attr.name, value)?;
    }
    Ok(id)
}

/// For every destination relationship the source entity also declares, maps the
/// source targets to their destination counterparts and writes them.
///
/// Targets that were not carried into this step are dropped. A to-one
/// destination fed by several counterparts fails the step.
pub fn copy_relationships(
    destination: RecordId,
    mapping: &EntityMapping,
    ctx: &mut MigrationContext<'_>,
) -> Result<()> {
    let Some(source_id) = ctx.source_instance(&mapping.name, &destination) else {
        return Ok(());
    };
    let source = ctx.source().require(&source_id)?;
    let source_definition = ctx.source_schema().require_entity(&mapping.source_entity)?;
    let destination_definition = ctx
        .destination_schema()
        .require_entity(&mapping.destination_entity)?;

    for rel in &destination_definition.relationships {
        if source_definition.relationship(&rel.name).is_none() {
            continue;
        }
        let Some(source_value) = source.relationship(&rel.name) else {
            continue;
        };

        let mut resolved = BTreeSet::new();
        for target in source_value.targets() {
            for candidate in ctx.resolve_destination(&target)? {
                let is_target_entity = ctx
                    .destination()
                    .get(&candidate)
                    .is_some_and(|record| record.entity == rel.target_entity);
                if is_target_entity {
                    resolved.insert(candidate);
                }
            }
        }

        let value = match rel.cardinality {
            Cardinality::ToMany => RelationshipValue::ToMany(resolved),
            Cardinality::ToOne => {
                if resolved.len() > 1 {
                    return Err(VaultError::ConstraintViolation(format!(
                        "to-one relationship '{}.{}' of record {} resolves to {} records",
                        mapping.destination_entity,
                        rel.name,
                        destination,
                        resolved.len()
                    )));
                }
                RelationshipValue::ToOne(resolved.into_iter().next())
            }
        };
        ctx.destination_mut()
            .set_relationship(&destination, &rel.name, value)?;
    }
    Ok(())
}

pub mod generic;

use super::context::MigrationContext;
use crate::core::Result;
use crate::schema::EntityMapping;
use crate::storage::{Record, RecordId};
use std::collections::HashMap;
use tracing::debug;

pub use generic::GenericPolicy;

/// Per-entity-mapping construction logic for one version transition.
///
/// Both methods default to the generic behavior, so a policy only overrides the
/// phase it customizes.
pub trait TransformationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Phase 1: build the destination instance(s) for `source` and associate them.
    fn create_destination_instances(
        &self,
        source: &Record,
        mapping: &EntityMapping,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<()> {
        let destination = generic::copy_instance(source, mapping, ctx)?;
        ctx.associate(mapping, source.id, destination)
    }

    /// Phase 2: wire the relationships of one destination instance produced by `mapping`.
    fn create_relationships(
        &self,
        destination: RecordId,
        mapping: &EntityMapping,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<()> {
        generic::copy_relationships(destination, mapping, ctx)
    }
}

/// Policies keyed by `(entity mapping name, transition tag)`, with the generic
/// policy as fallback.
pub struct PolicyRegistry {
    policies: HashMap<(String, String), Box<dyn TransformationPolicy>>,
    fallback: Box<dyn TransformationPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
            fallback: Box::new(GenericPolicy),
        }
    }

    pub fn register(
        &mut self,
        mapping_name: impl Into<String>,
        transition_tag: impl Into<String>,
        policy: Box<dyn TransformationPolicy>,
    ) {
        let key = (mapping_name.into(), transition_tag.into());
        debug!(
            mapping = %key.0,
            tag = %key.1,
            policy = policy.name(),
            "registered transformation policy"
        );
        self.policies.insert(key, policy);
    }

    pub fn with_policy(
        mut self,
        mapping_name: impl Into<String>,
        transition_tag: impl Into<String>,
        policy: Box<dyn TransformationPolicy>,
    ) -> Self {
        self.register(mapping_name, transition_tag, policy);
        self
    }

    /// Untagged mappings and unregistered pairs get the generic policy.
    pub fn resolve(&self, mapping: &EntityMapping) -> &dyn TransformationPolicy {
        mapping
            .transition_tag()
            .and_then(|tag| self.policies.get(&(mapping.name.clone(), tag.to_string())))
            .map(|boxed| &**boxed)
            .unwrap_or(&*self.fallback)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use crate::core::{Result, VaultError};
use crate::schema::{SchemaRegistry, SchemaVersion};
use crate::storage::{PersistedStoreMetadata, StoreFile};
use std::path::Path;

/// Reads the header of the store at `location` without loading its records.
pub fn read_metadata(location: &Path) -> Result<PersistedStoreMetadata> {
    StoreFile::new(location).read_metadata()
}

/// All-or-nothing: every entity fingerprint must match, and no entity may be
/// missing or extra on either side.
pub fn is_compatible(metadata: &PersistedStoreMetadata, schema: &SchemaVersion) -> bool {
    metadata.matches(schema)
}

/// The registered version a store was written under.
///
/// A store whose layout matches no registered version predates (or postdates)
/// the whole chain, so there is nowhere to migrate it from.
pub fn source_model<'r>(
    registry: &'r SchemaRegistry,
    metadata: &PersistedStoreMetadata,
) -> Result<&'r SchemaVersion> {
    registry
        .model_for_fingerprint(&metadata.entity_fingerprints)
        .ok_or_else(|| {
            VaultError::NoMigrationPath(format!(
                "{} (layout matches no registered schema)",
                metadata.schema_identifier
            ))
        })
}

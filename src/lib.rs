// ============================================================================
// NoteVault Library
// ============================================================================
//
// A local record store that upgrades itself across schema versions. On
// launch the store header is compared against the newest registered schema;
// when they differ, mapping specifications are applied one at a time until the
// store is current, each step written to a temporary store and renamed over
// the original.

pub mod catalog;
pub mod config;
pub mod core;
pub mod facade;
pub mod migration;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use core::{DataType, Result, Value, VaultError};
pub use facade::{StoreController, StoreHandle};
pub use migration::{
    MigrationOrchestrator, MigrationReport, MigrationState, PolicyRegistry, StepReport,
    TransformationPolicy,
};
pub use schema::{
    AttributeDefinition, Cardinality, EntityDefinition, EntityMapping, MappingSpecification,
    RelationshipDefinition, SchemaBundle, SchemaRegistry, SchemaVersion,
};
pub use storage::{
    PersistedStoreMetadata, Record, RecordId, RecordStore, RelationshipValue, StoreFile,
};

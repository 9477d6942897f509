pub mod bundle;
pub mod mapping;
pub mod model;
pub mod registry;

pub use bundle::SchemaBundle;
pub use mapping::{EntityMapping, MappingSpecification, SOURCE_VERSION_KEY};
pub use model::{
    AttributeDefinition, Cardinality, EntityDefinition, RelationshipDefinition, SchemaFingerprint,
    SchemaVersion,
};
pub use registry::SchemaRegistry;

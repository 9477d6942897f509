pub mod persistence;
pub mod record;
pub mod store;

pub use persistence::{PersistedStoreMetadata, StoreFile, STORE_FORMAT_VERSION};
pub use record::{Record, RecordId, RelationshipValue};
pub use store::RecordStore;

use crate::core::{Result, Value};
use crate::migration::MigrationReport;
use crate::schema::SchemaVersion;
use crate::storage::{
    PersistedStoreMetadata, Record, RecordId, RecordStore, RelationshipValue, StoreFile,
};
use tracing::{Level, event};

/// A store that is current with the final schema and open for normal use.
///
/// Changes stay in memory until [`StoreHandle::save`].
#[derive(Debug)]
pub struct StoreHandle {
    file: StoreFile,
    store: RecordStore,
    report: Option<MigrationReport>,
}

impl StoreHandle {
    pub(crate) fn new(
        file: StoreFile,
        store: RecordStore,
        report: Option<MigrationReport>,
    ) -> Self {
        Self { file, store, report }
    }

    pub fn schema(&self) -> &SchemaVersion {
        self.store.schema()
    }

    /// The migration that ran while the store was being obtained, if any.
    pub fn migration_report(&self) -> Option<&MigrationReport> {
        self.report.as_ref()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn insert(&mut self, entity: &str) -> Result<RecordId> {
        self.store.insert_new(entity)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.store.get(id)
    }

    pub fn set_attribute(
        &mut self,
        id: &RecordId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.store.set_attribute(id, name, value.into())
    }

    /// Overwrites one side of a relationship. Use [`StoreHandle::link`] to keep
    /// the inverse in step.
    pub fn set_relationship(
        &mut self,
        id: &RecordId,
        name: &str,
        value: RelationshipValue,
    ) -> Result<()> {
        self.store.set_relationship(id, name, value)
    }

    pub fn link(&mut self, id: &RecordId, name: &str, target: RecordId) -> Result<()> {
        self.store.link(id, name, target)
    }

    pub fn unlink(&mut self, id: &RecordId, name: &str, target: RecordId) -> Result<()> {
        self.store.unlink(id, name, target)
    }

    /// Removes the record and every reference other records hold to it.
    pub fn delete(&mut self, id: &RecordId) -> Result<Record> {
        self.store.remove(id)
    }

    pub fn instances_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Record> {
        self.store.instances_of(entity)
    }

    /// Validates the working set and writes it to disk.
    pub fn save(&self) -> Result<PersistedStoreMetadata> {
        self.store.validate()?;
        let metadata = self.file.save(&self.store)?;
        event!(
            Level::DEBUG,
            path = %self.file.path().display(),
            records = metadata.record_count,
            "store saved"
        );
        Ok(metadata)
    }

    /// The header as it is currently on disk.
    pub fn metadata(&self) -> Result<PersistedStoreMetadata> {
        self.file.read_metadata()
    }
}

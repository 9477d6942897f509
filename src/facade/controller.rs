use super::handle::StoreHandle;
use crate::catalog;
use crate::config::StoreConfig;
use crate::core::{Result, VaultError};
use crate::migration::{MigrationOrchestrator, PolicyRegistry};
use crate::schema::SchemaRegistry;
use crate::storage::{RecordStore, StoreFile};
use tracing::{Level, event, info_span};

/// Owns everything needed to bring the store up to date and hand it out.
pub struct StoreController {
    config: StoreConfig,
    registry: SchemaRegistry,
    policies: PolicyRegistry,
}

impl StoreController {
    pub fn new(config: StoreConfig, registry: SchemaRegistry, policies: PolicyRegistry) -> Self {
        Self {
            config,
            registry,
            policies,
        }
    }

    /// Controller over the bundled note schema chain.
    pub fn for_notes(config: StoreConfig) -> Result<Self> {
        Ok(Self::new(config, catalog::note_registry()?, catalog::note_policies()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Resets or migrates the store, then attaches it.
    ///
    /// When no store file exists, an empty store at the final schema is
    /// created and written so later launches find it current.
    pub fn obtain_ready_store(&self) -> Result<StoreHandle> {
        let span = info_span!("obtain_ready_store", store = %self.config.store_path.display());
        let _guard = span.enter();

        self.config.validate().map_err(VaultError::InvalidConfig)?;
        let file = StoreFile::new(&self.config.store_path);

        if self.config.reset && file.exists() {
            event!(Level::WARN, "reset requested, discarding existing store");
            file.remove()?;
        }

        let report = if file.exists() {
            let mut orchestrator = MigrationOrchestrator::new(
                &self.registry,
                &self.policies,
                &self.config.store_path,
                &self.config.temporary_path,
            );
            Some(orchestrator.run()?)
        } else {
            None
        };

        let final_schema = self.registry.final_version();
        let store = if file.exists() {
            file.load(final_schema)?
        } else {
            event!(Level::INFO, schema = %final_schema.identifier, "creating new store");
            let store = RecordStore::new(final_schema.clone());
            file.save(&store)?;
            store
        };

        event!(Level::INFO, records = store.len(), "store attached");
        Ok(StoreHandle::new(file, store, report))
    }

    /// Like [`StoreController::obtain_ready_store`], but a failure ends the
    /// process. There is no safe way to continue without a usable store.
    pub fn obtain_or_abort(&self) -> StoreHandle {
        match self.obtain_ready_store() {
            Ok(handle) => handle,
            Err(err) => {
                event!(
                    Level::ERROR,
                    error = %err,
                    fatal = err.is_fatal(),
                    "unable to obtain a ready store"
                );
                std::process::exit(1);
            }
        }
    }
}

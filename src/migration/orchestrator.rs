//! The iterative migration loop.
//!
//! ```text
//! Idle -> Checking -> Migrating -> Swapping -> Checking ... -> Done
//!            \___________\____________\_____________________-> Failed
//! ```
//!
//! Each pass reads the store header, stops when it matches the final schema,
//! and otherwise runs exactly one mapping specification into the temporary
//! location before renaming it over the store. The registry only admits
//! mappings that move forward along its version chain, so the loop ends after
//! at most `registry.len() - 1` steps.

use super::executor::MigrationExecutor;
use super::metadata;
use super::policy::PolicyRegistry;
use super::resolver::MappingResolver;
use crate::core::{Result, VaultError};
use crate::schema::SchemaRegistry;
use crate::storage::StoreFile;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, event, info_span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    Checking,
    Migrating,
    Swapping,
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub from: String,
    pub to: String,
    pub source_records: usize,
    pub destination_records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub steps: Vec<StepReport>,
    pub final_schema: String,
}

impl MigrationReport {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

pub struct MigrationOrchestrator<'a> {
    registry: &'a SchemaRegistry,
    policies: &'a PolicyRegistry,
    store_path: PathBuf,
    temporary_path: PathBuf,
    state: MigrationState,
}

impl<'a> MigrationOrchestrator<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        policies: &'a PolicyRegistry,
        store_path: impl AsRef<Path>,
        temporary_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            registry,
            policies,
            store_path: store_path.as_ref().to_path_buf(),
            temporary_path: temporary_path.as_ref().to_path_buf(),
            state: MigrationState::Idle,
        }
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    /// Migrates the store until it matches the registry's final schema.
    pub fn run(&mut self) -> Result<MigrationReport> {
        let span = info_span!("migrate_store", store = %self.store_path.display());
        let _guard = span.enter();

        match self.drive() {
            Ok(report) => {
                self.transition(MigrationState::Done);
                event!(
                    Level::INFO,
                    steps = report.step_count(),
                    schema = %report.final_schema,
                    "store is current"
                );
                Ok(report)
            }
            Err(err) => {
                event!(Level::ERROR, error = %err, "store migration failed");
                self.transition(MigrationState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<MigrationReport> {
        let registry = self.registry;
        let final_schema = registry.final_version();
        let mut steps = Vec::new();

        loop {
            self.transition(MigrationState::Checking);
            let current = metadata::read_metadata(&self.store_path)?;
            if metadata::is_compatible(&current, final_schema) {
                return Ok(MigrationReport {
                    steps,
                    final_schema: final_schema.identifier.clone(),
                });
            }

            self.transition(MigrationState::Migrating);
            let source_schema = metadata::source_model(registry, &current)?;
            let (destination_schema, spec) = MappingResolver::new(registry).resolve(source_schema)?;
            event!(
                Level::INFO,
                from = %source_schema.identifier,
                to = %destination_schema.identifier,
                "migrating store"
            );

            let temporary = StoreFile::new(&self.temporary_path);
            temporary
                .remove()
                .map_err(|e| VaultError::SwapFailed(format!("clearing temporary store: {}", e)))?;

            let source = StoreFile::new(&self.store_path).load(source_schema)?;
            let outcome =
                MigrationExecutor::new(self.policies).execute(spec, &source, destination_schema)?;
            temporary
                .save(&outcome.destination)
                .map_err(|e| VaultError::SwapFailed(format!("writing temporary store: {}", e)))?;

            self.transition(MigrationState::Swapping);
            self.swap()?;

            let refreshed = metadata::read_metadata(&self.store_path)?;
            if !metadata::is_compatible(&refreshed, destination_schema) {
                return Err(VaultError::MigrationStepFailed {
                    from: source_schema.identifier.clone(),
                    to: destination_schema.identifier.clone(),
                    reason: format!("store reports '{}' after swap", refreshed.schema_identifier),
                });
            }

            steps.push(StepReport {
                from: source_schema.identifier.clone(),
                to: destination_schema.identifier.clone(),
                source_records: source.len(),
                destination_records: outcome.destination.len(),
            });
        }
    }

    /// Renames the finished temporary store over the original. The rename
    /// replaces the target in one step, so there is no window in which neither
    /// file exists.
    fn swap(&self) -> Result<()> {
        fs::rename(&self.temporary_path, &self.store_path).map_err(|e| {
            VaultError::SwapFailed(format!(
                "moving '{}' to '{}': {}",
                self.temporary_path.display(),
                self.store_path.display(),
                e
            ))
        })
    }

    fn transition(&mut self, next: MigrationState) {
        event!(Level::DEBUG, from = ?self.state, to = ?next, "migration state");
        self.state = next;
    }
}

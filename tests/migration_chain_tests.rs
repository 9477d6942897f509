//! Integration tests for the iterative migration loop over the bundled note chain

use notevault::catalog::{self, notes};
use notevault::migration::MigrationOrchestrator;
use notevault::{
    AttributeDefinition, DataType, EntityDefinition, EntityMapping, MappingSpecification,
    MigrationState, PolicyRegistry, SchemaRegistry, SchemaVersion, StoreConfig, StoreFile, Value,
    VaultError,
};
use std::fs;
use tempfile::TempDir;

fn run_chain(config: &StoreConfig) -> notevault::Result<notevault::MigrationReport> {
    let registry = catalog::note_registry()?;
    let policies = catalog::note_policies();
    let mut orchestrator = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    );
    orchestrator.run()
}

#[test]
fn test_full_chain_from_oldest_version() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());

    let seeded = notes::sample_store(&notes::v1_0(), 5, false).unwrap();
    StoreFile::new(&config.store_path).save(&seeded).unwrap();

    let report = run_chain(&config).unwrap();
    assert_eq!(report.step_count(), 3);
    assert_eq!(report.final_schema, notes::V1_3);

    let hops: Vec<(&str, &str)> = report
        .steps
        .iter()
        .map(|step| (step.from.as_str(), step.to.as_str()))
        .collect();
    assert_eq!(
        hops,
        vec![
            (notes::V1_0, notes::V1_1),
            (notes::V1_1, notes::V1_2),
            (notes::V1_2, notes::V1_3)
        ]
    );

    let metadata = StoreFile::new(&config.store_path).read_metadata().unwrap();
    assert_eq!(metadata.schema_identifier, notes::V1_3);
    assert_eq!(metadata.record_count, 5);
    assert!(!config.temporary_path.exists());

    let store = StoreFile::new(&config.store_path).load(&notes::v1_3()).unwrap();
    let mut titles: Vec<String> = store
        .instances_of("Note")
        .filter_map(|note| note.attribute("title").and_then(Value::as_str).map(str::to_string))
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Note 0", "Note 1", "Note 2", "Note 3", "Note 4"]);
}

#[test]
fn test_inline_images_survive_to_final_version() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());

    let seeded = notes::sample_store(&notes::v1_1(), 4, true).unwrap();
    let payloads: Vec<Value> = seeded
        .instances_of("Note")
        .filter_map(|note| note.attribute("imageData").cloned())
        .filter(|value| !value.is_empty())
        .collect();
    assert_eq!(payloads.len(), 2);
    StoreFile::new(&config.store_path).save(&seeded).unwrap();

    let report = run_chain(&config).unwrap();
    assert_eq!(report.step_count(), 2);

    let store = StoreFile::new(&config.store_path).load(&notes::v1_3()).unwrap();
    assert_eq!(store.count_of("Note"), 4);
    assert_eq!(store.count_of("Image"), 2);

    for note in store.instances_of("Note") {
        let images = note.related("images");
        assert!(images.len() <= 1);
        for image_id in images {
            let image = store.get(&image_id).unwrap();
            assert_eq!(image.attribute("index"), Some(&Value::Integer(0)));
            assert_eq!(image.to_one("noteUsedIn"), Some(note.id));
            assert!(payloads.contains(image.attribute("imageData").unwrap()));
        }
    }
}

#[test]
fn test_current_store_takes_no_steps() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());

    let seeded = notes::sample_store(&notes::v1_3(), 2, true).unwrap();
    let written = StoreFile::new(&config.store_path).save(&seeded).unwrap();
    let before = fs::read(&config.store_path).unwrap();

    let report = run_chain(&config).unwrap();
    assert!(report.is_noop());
    assert_eq!(fs::read(&config.store_path).unwrap(), before);

    let again = run_chain(&config).unwrap();
    assert!(again.is_noop());
    let metadata = StoreFile::new(&config.store_path).read_metadata().unwrap();
    assert_eq!(metadata, written);
}

#[test]
fn test_rerun_after_migration_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let seeded = notes::sample_store(&notes::v1_2(), 3, true).unwrap();
    StoreFile::new(&config.store_path).save(&seeded).unwrap();

    assert_eq!(run_chain(&config).unwrap().step_count(), 1);
    assert!(run_chain(&config).unwrap().is_noop());
}

#[test]
fn test_stale_temporary_store_is_cleared() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let seeded = notes::sample_store(&notes::v1_0(), 2, false).unwrap();
    StoreFile::new(&config.store_path).save(&seeded).unwrap();
    fs::write(&config.temporary_path, b"left over from a crash").unwrap();

    let report = run_chain(&config).unwrap();
    assert_eq!(report.step_count(), 3);
    assert!(!config.temporary_path.exists());
}

#[test]
fn test_unreadable_store_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    fs::write(&config.store_path, b"definitely not a store").unwrap();

    let registry = catalog::note_registry().unwrap();
    let policies = catalog::note_policies();
    let mut orchestrator = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    );
    let result = orchestrator.run();

    assert!(matches!(result, Err(VaultError::StoreUnreadable { .. })));
    assert!(matches!(orchestrator.state(), MigrationState::Failed(_)));
    assert_eq!(fs::read(&config.store_path).unwrap(), b"definitely not a store");
}

#[test]
fn test_unknown_schema_has_no_migration_path() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());

    let foreign = SchemaVersion::new("v0.9").with_entity(
        EntityDefinition::new("Memo")
            .with_attribute(AttributeDefinition::new("text", DataType::Text)),
    );
    let store = notevault::RecordStore::new(foreign);
    StoreFile::new(&config.store_path).save(&store).unwrap();

    let result = run_chain(&config);
    assert!(matches!(result, Err(VaultError::NoMigrationPath(_))));
}

#[test]
fn test_gap_in_chain_has_no_migration_path() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let seeded = notes::sample_store(&notes::v1_0(), 1, false).unwrap();
    StoreFile::new(&config.store_path).save(&seeded).unwrap();

    // v1.0 -> v1.1 is missing
    let registry = SchemaRegistry::new(
        vec![notes::v1_0(), notes::v1_1(), notes::v1_2(), notes::v1_3()],
        notes::mappings().into_iter().skip(1).collect(),
    )
    .unwrap();
    let policies = catalog::note_policies();
    let mut orchestrator = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    );

    match orchestrator.run() {
        Err(VaultError::NoMigrationPath(schema)) => assert!(schema.contains(notes::V1_0)),
        other => panic!("expected NoMigrationPath, got {other:?}"),
    }
    let metadata = StoreFile::new(&config.store_path).read_metadata().unwrap();
    assert_eq!(metadata.schema_identifier, notes::V1_0);
}

#[test]
fn test_two_mappings_from_same_schema_are_ambiguous() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let seeded = notes::sample_store(&notes::v1_0(), 1, false).unwrap();
    StoreFile::new(&config.store_path).save(&seeded).unwrap();

    let mut mappings = notes::mappings();
    mappings.push(
        MappingSpecification::new(notes::V1_0, notes::V1_2)
            .with_entity_mapping(EntityMapping::new("Note", "Note")),
    );
    let registry = SchemaRegistry::new(
        vec![notes::v1_0(), notes::v1_1(), notes::v1_2(), notes::v1_3()],
        mappings,
    )
    .unwrap();
    let policies = PolicyRegistry::new();
    let mut orchestrator = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    );

    let result = orchestrator.run();
    assert!(matches!(result, Err(VaultError::AmbiguousMigrationPath { .. })));
    let metadata = StoreFile::new(&config.store_path).read_metadata().unwrap();
    assert_eq!(metadata.schema_identifier, notes::V1_0);
}

#[test]
fn test_failed_step_leaves_store_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());

    // The destination requires a tag the source has no value for.
    let v1 = SchemaVersion::new("v1").with_entity(
        EntityDefinition::new("Note")
            .with_attribute(AttributeDefinition::new("title", DataType::Text)),
    );
    let v2 = SchemaVersion::new("v2").with_entity(
        EntityDefinition::new("Note")
            .with_attribute(AttributeDefinition::new("title", DataType::Text))
            .with_attribute(AttributeDefinition::new("tag", DataType::Text).required()),
    );
    let registry = SchemaRegistry::new(
        vec![v1.clone(), v2],
        vec![
            MappingSpecification::new("v1", "v2")
                .with_entity_mapping(EntityMapping::new("Note", "Note")),
        ],
    )
    .unwrap();

    let mut store = notevault::RecordStore::new(v1);
    let note = store.insert_new("Note").unwrap();
    store.set_attribute(&note, "title", Value::from("kept")).unwrap();
    StoreFile::new(&config.store_path).save(&store).unwrap();
    let before = fs::read(&config.store_path).unwrap();

    let policies = PolicyRegistry::new();
    let mut orchestrator = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    );
    match orchestrator.run() {
        Err(VaultError::MigrationStepFailed { from, to, .. }) => {
            assert_eq!(from, "v1");
            assert_eq!(to, "v2");
        }
        other => panic!("expected MigrationStepFailed, got {other:?}"),
    }
    assert_eq!(fs::read(&config.store_path).unwrap(), before);
    assert!(!config.temporary_path.exists());
}

#[test]
fn test_blocked_temporary_location_fails_swap() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let seeded = notes::sample_store(&notes::v1_1(), 3, true).unwrap();
    StoreFile::new(&config.store_path).save(&seeded).unwrap();
    let before = fs::read(&config.store_path).unwrap();

    // A directory where the temporary store should go cannot be cleared or replaced.
    fs::create_dir(&config.temporary_path).unwrap();

    let registry = catalog::note_registry().unwrap();
    let policies = catalog::note_policies();
    let mut orchestrator = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    );
    let result = orchestrator.run();

    match result {
        Err(err @ VaultError::SwapFailed(_)) => assert!(err.is_fatal()),
        other => panic!("expected SwapFailed, got {other:?}"),
    }
    assert!(matches!(orchestrator.state(), MigrationState::Failed(_)));
    assert_eq!(fs::read(&config.store_path).unwrap(), before);
    assert!(config.temporary_path.is_dir());
}

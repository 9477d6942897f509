//! Property tests for generic multi-step migration

use notevault::migration::MigrationOrchestrator;
use notevault::{
    AttributeDefinition, DataType, EntityDefinition, EntityMapping, MappingSpecification,
    PolicyRegistry, RecordStore, SchemaRegistry, SchemaVersion, StoreConfig, StoreFile, Value,
};
use quickcheck::{QuickCheck, TestResult};
use std::collections::BTreeMap;
use tempfile::TempDir;

/// `v0 .. v{len-1}`, each version adding one integer attribute to `Note`.
fn growing_chain(len: usize) -> SchemaRegistry {
    let versions: Vec<SchemaVersion> = (0..len)
        .map(|n| {
            let note = (0..n).fold(
                EntityDefinition::new("Note")
                    .with_attribute(AttributeDefinition::new("title", DataType::Text))
                    .with_attribute(AttributeDefinition::new("rank", DataType::Integer)),
                |note, extra| {
                    note.with_attribute(
                        AttributeDefinition::new(format!("extra{}", extra), DataType::Integer)
                            .required()
                            .with_default(extra as i64),
                    )
                },
            );
            SchemaVersion::new(format!("v{}", n)).with_entity(note)
        })
        .collect();
    let mappings = (1..len)
        .map(|n| {
            MappingSpecification::new(format!("v{}", n - 1), format!("v{}", n))
                .with_entity_mapping(EntityMapping::new("Note", "Note"))
        })
        .collect();
    SchemaRegistry::new(versions, mappings).unwrap()
}

fn seed(registry: &SchemaRegistry, notes: &[(String, i64)], config: &StoreConfig) {
    let mut store = RecordStore::new(registry.versions()[0].clone());
    for (title, rank) in notes {
        let id = store.insert_new("Note").unwrap();
        store.set_attribute(&id, "title", Value::from(title.as_str())).unwrap();
        store.set_attribute(&id, "rank", Value::Integer(*rank)).unwrap();
    }
    StoreFile::new(&config.store_path).save(&store).unwrap();
}

fn prop_chain_takes_one_step_per_version(len: u8, notes: Vec<(String, i64)>) -> TestResult {
    let len = (len % 6) as usize + 1;
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let registry = growing_chain(len);
    seed(&registry, &notes, &config);

    let policies = PolicyRegistry::new();
    let report = MigrationOrchestrator::new(
        &registry,
        &policies,
        &config.store_path,
        &config.temporary_path,
    )
    .run()
    .unwrap();

    let metadata = StoreFile::new(&config.store_path).read_metadata().unwrap();
    TestResult::from_bool(
        report.step_count() == len - 1
            && metadata.schema_identifier == format!("v{}", len - 1)
            && metadata.record_count == notes.len()
            && report
                .steps
                .iter()
                .all(|step| {
                    step.source_records == notes.len() && step.destination_records == notes.len()
                }),
    )
}

fn prop_generic_copy_keeps_attribute_values(notes: Vec<(String, i64)>) -> TestResult {
    if notes.is_empty() {
        return TestResult::discard();
    }
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::in_directory(temp_dir.path());
    let registry = growing_chain(3);
    seed(&registry, &notes, &config);

    let policies = PolicyRegistry::new();
    MigrationOrchestrator::new(&registry, &policies, &config.store_path, &config.temporary_path)
        .run()
        .unwrap();

    let store = StoreFile::new(&config.store_path)
        .load(registry.final_version())
        .unwrap();

    let mut expected: BTreeMap<(String, i64), usize> = BTreeMap::new();
    for note in &notes {
        *expected.entry(note.clone()).or_default() += 1;
    }
    let mut actual: BTreeMap<(String, i64), usize> = BTreeMap::new();
    for note in store.instances_of("Note") {
        let title = note.attribute("title").and_then(Value::as_str).unwrap_or_default().to_string();
        let rank = note.attribute("rank").and_then(Value::as_i64).unwrap_or_default();
        *actual.entry((title, rank)).or_default() += 1;

        if note.attribute("extra0") != Some(&Value::Integer(0))
            || note.attribute("extra1") != Some(&Value::Integer(1))
        {
            return TestResult::failed();
        }
    }
    TestResult::from_bool(expected == actual)
}

#[test]
fn chain_takes_one_step_per_version() {
    QuickCheck::new()
        .tests(25)
        .quickcheck(
            prop_chain_takes_one_step_per_version as fn(u8, Vec<(String, i64)>) -> TestResult,
        );
}

#[test]
fn generic_copy_keeps_attribute_values() {
    QuickCheck::new()
        .tests(25)
        .quickcheck(
            prop_generic_copy_keeps_attribute_values as fn(Vec<(String, i64)>) -> TestResult,
        );
}

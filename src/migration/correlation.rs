use crate::core::{Result, VaultError};
use crate::storage::RecordId;
use std::collections::HashMap;

/// Source -> destination instance lookup for one migration step, keyed by
/// entity mapping name. Dropped when the step ends.
#[derive(Debug, Default)]
pub struct CorrelationMap {
    by_mapping: HashMap<String, MappingCorrelation>,
}

#[derive(Debug, Default)]
struct MappingCorrelation {
    // Association order, which is also phase 2 iteration order.
    pairs: Vec<(RecordId, RecordId)>,
    forward: HashMap<RecordId, Vec<RecordId>>,
    reverse: HashMap<RecordId, RecordId>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `destination` was built from `source` under `mapping`.
    ///
    /// Repeating an existing pair is a no-op. A destination already owned by a
    /// different source is rejected and the map is left unchanged.
    pub fn associate(
        &mut self,
        mapping: &str,
        source: RecordId,
        destination: RecordId,
    ) -> Result<()> {
        let entry = self.by_mapping.entry(mapping.to_string()).or_default();
        match entry.reverse.get(&destination) {
            Some(existing) if *existing == source => return Ok(()),
            Some(existing) => {
                return Err(VaultError::ConstraintViolation(format!(
                    "mapping '{}' already associates {} with source {}, cannot reassign it to {}",
                    mapping, destination, existing, source
                )));
            }
            None => {}
        }
        entry.reverse.insert(destination, source);
        entry.pairs.push((source, destination));
        entry.forward.entry(source).or_default().push(destination);
        Ok(())
    }

    pub fn destination_instances(&self, mapping: &str, source: &RecordId) -> &[RecordId] {
        self.by_mapping
            .get(mapping)
            .and_then(|entry| entry.forward.get(source))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn source_instance(&self, mapping: &str, destination: &RecordId) -> Option<RecordId> {
        self.by_mapping
            .get(mapping)
            .and_then(|entry| entry.reverse.get(destination))
            .copied()
    }

    /// Destination instances associated under `mapping`, in association order.
    pub fn destinations_of(&self, mapping: &str) -> Vec<RecordId> {
        self.by_mapping
            .get(mapping)
            .map(|entry| entry.pairs.iter().map(|(_, dest)| *dest).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_mapping.values().map(|entry| entry.pairs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_lookup() {
        let mut map = CorrelationMap::new();
        let source = RecordId::new();
        let first = RecordId::new();
        let second = RecordId::new();
        map.associate("NoteToNote", source, first).unwrap();
        map.associate("NoteToNote", source, second).unwrap();

        assert_eq!(map.destination_instances("NoteToNote", &source), &[first, second]);
        assert_eq!(map.source_instance("NoteToNote", &second), Some(source));
        assert_eq!(map.destinations_of("NoteToNote"), vec![first, second]);
        assert!(map.destination_instances("ImageToImage", &source).is_empty());
    }

    #[test]
    fn test_duplicate_association_is_ignored() {
        let mut map = CorrelationMap::new();
        let source = RecordId::new();
        let destination = RecordId::new();
        map.associate("NoteToNote", source, destination).unwrap();
        map.associate("NoteToNote", source, destination).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_reassociation_with_other_source_is_rejected() {
        let mut map = CorrelationMap::new();
        let first_source = RecordId::new();
        let second_source = RecordId::new();
        let destination = RecordId::new();
        map.associate("NoteToNote", first_source, destination).unwrap();

        let result = map.associate("NoteToNote", second_source, destination);
        assert!(matches!(result, Err(VaultError::ConstraintViolation(_))));

        assert_eq!(map.source_instance("NoteToNote", &destination), Some(first_source));
        assert_eq!(map.destination_instances("NoteToNote", &first_source), &[destination]);
        assert!(map.destination_instances("NoteToNote", &second_source).is_empty());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_same_destination_under_other_mapping_is_independent() {
        let mut map = CorrelationMap::new();
        let note = RecordId::new();
        let image = RecordId::new();
        let destination = RecordId::new();
        map.associate("NoteToNote", note, destination).unwrap();
        map.associate("ImageToImage", image, destination).unwrap();
        assert_eq!(map.source_instance("ImageToImage", &destination), Some(image));
        assert_eq!(map.source_instance("NoteToNote", &destination), Some(note));
    }
}

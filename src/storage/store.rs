use super::record::{Record, RecordId, RelationshipValue};
use crate::core::{Result, Value, VaultError};
use crate::schema::{Cardinality, EntityDefinition, SchemaVersion};
use std::collections::BTreeMap;

/// The in-memory working set of one store file, bound to the schema version it
/// conforms to.
///
/// All writes are validated against that schema. Relationship writes through
/// [`RecordStore::set_relationship`] touch only the named side; [`RecordStore::link`]
/// and [`RecordStore::unlink`] also maintain the declared inverse.
#[derive(Debug, Clone)]
pub struct RecordStore {
    schema: SchemaVersion,
    records: BTreeMap<RecordId, Record>,
}

impl RecordStore {
    pub fn new(schema: SchemaVersion) -> Self {
        Self {
            schema,
            records: BTreeMap::new(),
        }
    }

    /// Rebuilds a store from records read off disk, checking each one against `schema`.
    pub fn from_records(schema: SchemaVersion, records: Vec<Record>) -> Result<Self> {
        let mut store = Self::new(schema);
        for record in records {
            store.check_record_shape(&record)?;
            store.records.insert(record.id, record);
        }
        Ok(store)
    }

    pub fn schema(&self) -> &SchemaVersion {
        &self.schema
    }

    /// Inserts a new instance of `entity` with every attribute at its declared
    /// default and every relationship empty.
    pub fn insert_new(&mut self, entity: &str) -> Result<RecordId> {
        let definition = self.schema.require_entity(entity)?;
        let mut record = Record::new(RecordId::new(), entity);
        for attr in &definition.attributes {
            record.attributes.insert(attr.name.clone(), attr.initial_value());
        }
        for rel in &definition.relationships {
            record
                .relationships
                .insert(rel.name.clone(), RelationshipValue::empty(rel.cardinality));
        }
        let id = record.id;
        self.records.insert(id, record);
        Ok(id)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn require(&self, id: &RecordId) -> Result<&Record> {
        self.records
            .get(id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    pub fn set_attribute(&mut self, id: &RecordId, name: &str, value: Value) -> Result<()> {
        let entity = self.require(id)?.entity.clone();
        let definition = self.entity_definition(&entity)?;
        let attr = definition
            .attribute(name)
            .ok_or_else(|| VaultError::AttributeNotFound(name.to_string(), entity.clone()))?;
        if !attr.data_type.is_compatible(&value) {
            return Err(VaultError::TypeMismatch(format!(
                "Attribute '{}.{}' expects type {}, got {}",
                entity,
                name,
                attr.data_type,
                value.type_name()
            )));
        }

        if let Some(record) = self.records.get_mut(id) {
            record.attributes.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Replaces one side of a relationship without touching its inverse.
    pub fn set_relationship(
        &mut self,
        id: &RecordId,
        name: &str,
        value: RelationshipValue,
    ) -> Result<()> {
        let entity = self.require(id)?.entity.clone();
        let definition = self.entity_definition(&entity)?;
        let rel = definition
            .relationship(name)
            .ok_or_else(|| VaultError::RelationshipNotFound(name.to_string(), entity.clone()))?;

        if rel.cardinality != value.cardinality() {
            return Err(VaultError::TypeMismatch(format!(
                "Relationship '{}.{}' is {:?}, got {:?}",
                entity,
                name,
                rel.cardinality,
                value.cardinality()
            )));
        }
        for target in value.targets() {
            let target_record = self.require(&target)?;
            if target_record.entity != rel.target_entity {
                return Err(VaultError::TypeMismatch(format!(
                    "Relationship '{}.{}' targets '{}', got '{}'",
                    entity, name, rel.target_entity, target_record.entity
                )));
            }
        }

        if let Some(record) = self.records.get_mut(id) {
            record.relationships.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Adds `target` to `id.name` and mirrors the link on the declared inverse.
    pub fn link(&mut self, id: &RecordId, name: &str, target: RecordId) -> Result<()> {
        let entity = self.require(id)?.entity.clone();
        let rel = self
            .entity_definition(&entity)?
            .relationship(name)
            .ok_or_else(|| VaultError::RelationshipNotFound(name.to_string(), entity.clone()))?
            .clone();

        // A to-one overwrite drops the previous target's back-reference.
        if rel.cardinality == Cardinality::ToOne {
            if let Some(previous) = self.require(id)?.to_one(name) {
                if previous != target {
                    self.unlink(id, name, previous)?;
                }
            }
        }

        let mut value = self
            .require(id)?
            .relationship(name)
            .cloned()
            .unwrap_or_else(|| RelationshipValue::empty(rel.cardinality));
        value.add(target);
        self.set_relationship(id, name, value)?;

        if let Some(inverse) = &rel.inverse {
            let inverse_cardinality = self
                .entity_definition(&rel.target_entity)?
                .relationship(inverse)
                .map(|inv| inv.cardinality)
                .ok_or_else(|| {
                    VaultError::RelationshipNotFound(inverse.clone(), rel.target_entity.clone())
                })?;
            if inverse_cardinality == Cardinality::ToOne {
                if let Some(previous_owner) = self.require(&target)?.to_one(inverse) {
                    if previous_owner != *id {
                        self.remove_one_side(&previous_owner, name, &target);
                    }
                }
            }
            let mut back = self
                .require(&target)?
                .relationship(inverse)
                .cloned()
                .unwrap_or_else(|| RelationshipValue::empty(inverse_cardinality));
            back.add(*id);
            self.set_relationship(&target, inverse, back)?;
        }
        Ok(())
    }

    /// Removes `target` from `id.name` and from the declared inverse.
    pub fn unlink(&mut self, id: &RecordId, name: &str, target: RecordId) -> Result<()> {
        let entity = self.require(id)?.entity.clone();
        let rel = self
            .entity_definition(&entity)?
            .relationship(name)
            .ok_or_else(|| VaultError::RelationshipNotFound(name.to_string(), entity.clone()))?
            .clone();
        self.remove_one_side(id, name, &target);
        if let Some(inverse) = &rel.inverse {
            self.remove_one_side(&target, inverse, id);
        }
        Ok(())
    }

    /// Deletes a record and clears every reference to it.
    pub fn remove(&mut self, id: &RecordId) -> Result<Record> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| VaultError::RecordNotFound(id.to_string()))?;
        for other in self.records.values_mut() {
            for value in other.relationships.values_mut() {
                value.remove(id);
            }
        }
        Ok(record)
    }

    pub fn instances_of<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Record> {
        self.records.values().filter(move |record| record.entity == entity)
    }

    pub fn count_of(&self, entity: &str) -> usize {
        self.instances_of(entity).count()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Checks that every record satisfies the schema's non-optional constraints
    /// and that no relationship points at a missing record.
    pub fn validate(&self) -> Result<()> {
        for record in self.records.values() {
            let definition = self.entity_definition(&record.entity)?;
            for attr in &definition.attributes {
                let value = record.attribute(&attr.name).unwrap_or(&Value::Null);
                attr.validate(&record.entity, value)?;
            }
            for rel in &definition.relationships {
                let value = record.relationship(&rel.name);
                if !rel.optional && value.is_none_or(RelationshipValue::is_empty) {
                    return Err(VaultError::ConstraintViolation(format!(
                        "Relationship '{}.{}' of record {} is required",
                        record.entity, rel.name, record.id
                    )));
                }
                for target in value.map(RelationshipValue::targets).unwrap_or_default() {
                    if !self.records.contains_key(&target) {
                        return Err(VaultError::ConstraintViolation(format!(
                            "Relationship '{}.{}' of record {} points at missing record {}",
                            record.entity, rel.name, record.id, target
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn entity_definition(&self, entity: &str) -> Result<&EntityDefinition> {
        self.schema.require_entity(entity)
    }

    fn remove_one_side(&mut self, id: &RecordId, name: &str, target: &RecordId) {
        if let Some(value) = self
            .records
            .get_mut(id)
            .and_then(|record| record.relationships.get_mut(name))
        {
            value.remove(target);
        }
    }

    fn check_record_shape(&self, record: &Record) -> Result<()> {
        let definition = self.entity_definition(&record.entity)?;
        for name in record.attributes.keys() {
            if definition.attribute(name).is_none() {
                return Err(VaultError::AttributeNotFound(name.clone(), record.entity.clone()));
            }
        }
        for (name, value) in &record.relationships {
            let rel = definition.relationship(name).ok_or_else(|| {
                VaultError::RelationshipNotFound(name.clone(), record.entity.clone())
            })?;
            if rel.cardinality != value.cardinality() {
                return Err(VaultError::TypeMismatch(format!(
                    "Relationship '{}.{}' is {:?} on disk, schema says {:?}",
                    record.entity,
                    name,
                    value.cardinality(),
                    rel.cardinality
                )));
            }
        }
        Ok(())
    }
}

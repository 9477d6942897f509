//! Schema chain of the note-taking application.
//!
//! - `v1.0`: notes with a title and a body.
//! - `v1.1`: notes gain an inline `imageData` payload.
//! - `v1.2`: the payload moves into its own `Image` entity (`Note.image`).
//! - `v1.3`: a note holds many ordered images (`Note.images`, `Image.index`).

use super::policies::{ImageToImagePolicy, NoteToNotePolicy};
use crate::core::{DataType, Result, Value};
use crate::migration::PolicyRegistry;
use crate::schema::{
    AttributeDefinition, EntityDefinition, EntityMapping, MappingSpecification,
    RelationshipDefinition, SchemaRegistry, SchemaVersion,
};
use crate::storage::{RecordId, RecordStore};

pub const V1_0: &str = "v1.0";
pub const V1_1: &str = "v1.1";
pub const V1_2: &str = "v1.2";
pub const V1_3: &str = "v1.3";

fn note_text() -> [AttributeDefinition; 2] {
    [
        AttributeDefinition::new("title", DataType::Text).required().with_default(""),
        AttributeDefinition::new("body", DataType::Text).required().with_default(""),
    ]
}

fn note_entity() -> EntityDefinition {
    note_text()
        .into_iter()
        .fold(EntityDefinition::new("Note"), EntityDefinition::with_attribute)
}

pub fn v1_0() -> SchemaVersion {
    SchemaVersion::new(V1_0).with_entity(note_entity())
}

pub fn v1_1() -> SchemaVersion {
    SchemaVersion::new(V1_1).with_entity(
        note_entity().with_attribute(AttributeDefinition::new("imageData", DataType::Binary)),
    )
}

pub fn v1_2() -> SchemaVersion {
    SchemaVersion::new(V1_2)
        .with_entity(note_entity().with_relationship(
            RelationshipDefinition::to_one("image", "Image").with_inverse("noteUsedIn"),
        ))
        .with_entity(
            EntityDefinition::new("Image")
                .with_attribute(AttributeDefinition::new("imageData", DataType::Binary))
                .with_relationship(
                    RelationshipDefinition::to_one("noteUsedIn", "Note").with_inverse("image"),
                ),
        )
}

pub fn v1_3() -> SchemaVersion {
    SchemaVersion::new(V1_3)
        .with_entity(note_entity().with_relationship(
            RelationshipDefinition::to_many("images", "Image").with_inverse("noteUsedIn"),
        ))
        .with_entity(
            EntityDefinition::new("Image")
                .with_attribute(AttributeDefinition::new("imageData", DataType::Binary))
                .with_attribute(AttributeDefinition::new("index", DataType::Integer).required())
                .with_relationship(
                    RelationshipDefinition::to_one("noteUsedIn", "Note").with_inverse("images"),
                ),
        )
}

pub fn mappings() -> Vec<MappingSpecification> {
    vec![
        MappingSpecification::new(V1_0, V1_1)
            .with_entity_mapping(EntityMapping::new("Note", "Note")),
        MappingSpecification::new(V1_1, V1_2)
            .with_entity_mapping(EntityMapping::new("Note", "Note").with_transition_tag(V1_1)),
        MappingSpecification::new(V1_2, V1_3)
            .with_entity_mapping(EntityMapping::new("Note", "Note").with_transition_tag(V1_2))
            .with_entity_mapping(EntityMapping::new("Image", "Image").with_transition_tag(V1_2)),
    ]
}

pub fn registry() -> Result<SchemaRegistry> {
    SchemaRegistry::new(vec![v1_0(), v1_1(), v1_2(), v1_3()], mappings())
}

pub fn policies() -> PolicyRegistry {
    PolicyRegistry::new()
        .with_policy("NoteToNote", V1_1, Box::new(NoteToNotePolicy))
        .with_policy("NoteToNote", V1_2, Box::new(NoteToNotePolicy))
        .with_policy("ImageToImage", V1_2, Box::new(ImageToImagePolicy))
}

/// Builds a store of `notes` notes under `schema`, for seeding old stores.
///
/// With `with_images`, every other note carries a payload in whatever shape
/// the schema stores it (inline bytes, one `Image`, or an `images` set).
pub fn sample_store(
    schema: &SchemaVersion,
    notes: usize,
    with_images: bool,
) -> Result<RecordStore> {
    let mut store = RecordStore::new(schema.clone());
    let note_definition = schema.require_entity("Note")?.clone();

    for n in 0..notes {
        let id = store.insert_new("Note")?;
        store.set_attribute(&id, "title", Value::from(format!("Note {}", n)))?;
        store.set_attribute(&id, "body", Value::from(format!("Body of note {}", n)))?;

        if !with_images || n % 2 == 1 {
            continue;
        }
        let payload = Value::Binary(sample_payload(n));
        if note_definition.attribute("imageData").is_some() {
            store.set_attribute(&id, "imageData", payload)?;
        } else if note_definition.relationship("image").is_some() {
            let image = new_image(&mut store, payload)?;
            store.link(&id, "image", image)?;
        } else if note_definition.relationship("images").is_some() {
            let image = new_image(&mut store, payload)?;
            store.set_attribute(&image, "index", Value::Integer(0))?;
            store.link(&id, "images", image)?;
        }
    }
    Ok(store)
}

fn new_image(store: &mut RecordStore, payload: Value) -> Result<RecordId> {
    let image = store.insert_new("Image")?;
    store.set_attribute(&image, "imageData", payload)?;
    Ok(image)
}

fn sample_payload(n: usize) -> Vec<u8> {
    let mut payload = vec![0xFF, 0xD8, 0xFF];
    payload.extend((n as u32).to_le_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_chain_is_valid() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.final_version().identifier, V1_3);
    }

    #[test]
    fn test_sample_store_shapes() {
        let inline = sample_store(&v1_1(), 4, true).unwrap();
        assert_eq!(inline.count_of("Note"), 4);
        let with_payload = inline
            .instances_of("Note")
            .filter(|note| note.attribute("imageData").is_some_and(|v| !v.is_empty()))
            .count();
        assert_eq!(with_payload, 2);

        let single = sample_store(&v1_2(), 4, true).unwrap();
        assert_eq!(single.count_of("Image"), 2);
        single.validate().unwrap();

        let ordered = sample_store(&v1_3(), 3, true).unwrap();
        assert_eq!(ordered.count_of("Image"), 2);
        ordered.validate().unwrap();
    }
}

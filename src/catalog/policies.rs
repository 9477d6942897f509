//! Custom transformation policies for the note schema chain.

use super::notes::{V1_1, V1_2};
use crate::core::{Result, Value, VaultError};
use crate::migration::MigrationContext;
use crate::migration::TransformationPolicy;
use crate::migration::policy::generic;
use crate::schema::EntityMapping;
use crate::storage::{Record, RecordId, RelationshipValue};
use std::collections::BTreeSet;
use tracing::trace;

/// `NoteToNote` on the `v1.1` and `v1.2` transitions.
///
/// - `v1.1`: an inline `imageData` payload becomes a separate `Image` linked
///   through `Note.image` / `Image.noteUsedIn`. Notes without a payload get no image.
/// - `v1.2`: the single `image` becomes the one member of the `images` set.
pub struct NoteToNotePolicy;

impl TransformationPolicy for NoteToNotePolicy {
    fn name(&self) -> &'static str {
        "note_to_note"
    }

    fn create_destination_instances(
        &self,
        source: &Record,
        mapping: &EntityMapping,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<()> {
        let note = generic::copy_instance(source, mapping, ctx)?;

        if mapping.transition_tag() == Some(V1_1) {
            let payload = source.attribute("imageData").cloned().unwrap_or(Value::Null);
            if !payload.is_empty() {
                let image = ctx.insert_destination("Image")?;
                let destination = ctx.destination_mut();
                destination.set_attribute(&image, "imageData", payload)?;
                destination.link(&note, "image", image)?;
                trace!(note = %note, image = %image, "split inline image payload");
            }
        }

        ctx.associate(mapping, source.id, note)
    }

    fn create_relationships(
        &self,
        destination: RecordId,
        mapping: &EntityMapping,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<()> {
        generic::copy_relationships(destination, mapping, ctx)?;

        if mapping.transition_tag() != Some(V1_2) {
            return Ok(());
        }

        let source_note = ctx.source_instance(&mapping.name, &destination).ok_or_else(|| {
            VaultError::RecordNotFound(format!("no source note recorded for {}", destination))
        })?;
        let mut images = BTreeSet::new();
        if let Some(source_image) = ctx.source().require(&source_note)?.to_one("image") {
            let promoted = ctx.destination_instances("ImageToImage", &source_image);
            let image = promoted.first().copied().ok_or_else(|| {
                VaultError::RecordNotFound(format!(
                    "image {} was not carried into this step",
                    source_image
                ))
            })?;
            images.insert(image);
        }

        ctx.destination_mut()
            .set_relationship(&destination, "images", RelationshipValue::ToMany(images))
    }
}

/// `ImageToImage` on the `v1.2` transition: copies the image and gives it
/// position 0, the only slot a single-image note can occupy.
pub struct ImageToImagePolicy;

impl TransformationPolicy for ImageToImagePolicy {
    fn name(&self) -> &'static str {
        "image_to_image"
    }

    fn create_destination_instances(
        &self,
        source: &Record,
        mapping: &EntityMapping,
        ctx: &mut MigrationContext<'_>,
    ) -> Result<()> {
        let image = generic::copy_instance(source, mapping, ctx)?;
        if mapping.transition_tag() == Some(V1_2) {
            ctx.destination_mut().set_attribute(&image, "index", Value::Integer(0))?;
        }
        ctx.associate(mapping, source.id, image)
    }
}

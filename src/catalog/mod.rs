//! The bundled note schema chain and its custom policies.

pub mod notes;
pub mod policies;

pub use notes::{
    V1_0, V1_1, V1_2, V1_3, policies as note_policies, registry as note_registry, sample_store,
};
pub use policies::{ImageToImagePolicy, NoteToNotePolicy};

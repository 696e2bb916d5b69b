//! Metadata storage primitives.
//!
//! Two halves make up every metadata key. The [`Owner`] says what the value
//! is attached to (a controller type or one of its methods), and the
//! [`MetadataStore`] itself stands for the annotation that wrote it: each
//! [`Annotation`](crate::Annotation) owns exactly one store.

mod owner;
mod store;

pub use owner::{Owner, OwnerKind};
pub use store::MetadataStore;

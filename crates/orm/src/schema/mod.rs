//! Schema Registry - field and relationship tables per entity type

pub mod entity;
pub mod field;

pub use entity::{EntityType, EntityTypeBuilder, Loaded};
pub use field::{FieldKind, FieldSpec};

//! Runtime schema model.
//!
//! Types in `model` describe *what exists*: entities, their scalar fields,
//! relations, unique constraints and enums. A `Schema` is built once at
//! startup, validated, and then shared read-only by every client call.

mod descriptor;
mod entity;
mod field;
mod relation;
mod schema;

#[cfg(test)]
mod tests;

pub use entity::{EntityModel, UniqueModel};
pub use field::{DefaultValue, FieldModel, ScalarType};
pub use relation::{Cardinality, ReferentialAction, RelationLink, RelationModel};
pub use schema::{EnumModel, JoinKeys, Schema, SchemaBuilder, SchemaDescription};

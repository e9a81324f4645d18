//! Create and update payloads, including nested relation writes.

mod build;
mod model;

#[cfg(test)]
mod tests;

pub use model::{CreateData, FieldUpdate, RelationOp, RelationWrite, UpdateData};

pub(crate) use build::WriteBuilder;

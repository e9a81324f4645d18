//! Core runtime for Quarry: schema descriptors, query validation and
//! planning, dispatch, and result shaping, with the ergonomics exported
//! via the `prelude`.

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;

///
/// Prelude
///
/// Prelude contains the client surface and domain vocabulary.
/// Backends, plans, and error details stay one level down.
///

pub mod prelude {
    pub use crate::{
        config::ClientConfig,
        db::{BatchPayload, Client, CountResult, EntityKind, Record},
        error::Error,
        model::{EntityModel, FieldModel, RelationModel, ScalarType, Schema},
        value::Value,
    };
}

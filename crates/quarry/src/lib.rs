//! ## Crate layout
//! - `core`: schema descriptors, query validation and planning, dispatch,
//!   and result shaping.
//! - `backend`: the backend seam plus the in-memory reference backend.
//!
//! The `prelude` module mirrors the surface used by application code:
//! build a schema, construct a `Client` over a backend, then call
//! operations through per-entity delegates.

pub use quarry_core as core;

/// re-exports
///
/// stops the user having to list the argument and decoding crates in
/// their own Cargo.toml just to talk to a client
pub mod __reexports {
    pub use async_trait;
    pub use rust_decimal;
    pub use serde;
    pub use serde_json;
}

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::{Error, config, db, error, model, value};

pub mod backend {
    pub use crate::core::db::backend::{
        AggregateRow, Backend, BackendError, ExecutionContext, GroupRow, RawCell, RawResult,
        RawRow, memory::MemoryBackend,
    };
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        backend::MemoryBackend,
        core::{
            config::{ClientConfig, ErrorFormat, TransactionOptions},
            db::{
                BatchPayload, Client, CountResult, Delegate, EntityKind, Field, Interceptor, Next,
                Record, TypedDelegate,
            },
            error::{ConstraintKind, Error, ErrorClass},
            model::{
                DefaultValue, EntityModel, EnumModel, FieldModel, ReferentialAction,
                RelationModel, ScalarType, Schema, UniqueModel,
            },
            value::Value,
        },
    };
    pub use async_trait::async_trait;
    pub use rust_decimal::Decimal;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;
}

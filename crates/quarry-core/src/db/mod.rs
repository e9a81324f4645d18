//! Client surface: per-entity delegates over a pluggable backend.

pub mod backend;
pub mod dispatch;
pub mod query;
pub mod response;

mod client;
mod delegate;
mod typed;

pub use client::{Client, ClientBuilder};
pub use delegate::{BatchPayload, CountResult, Delegate};
pub use dispatch::{Interceptor, Next};
pub use response::{Field, Record};
pub use typed::{EntityKind, TypedDelegate};

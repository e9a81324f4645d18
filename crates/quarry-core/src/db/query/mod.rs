//! Argument validation and plan assembly.
//!
//! Everything in this module is pure: raw argument documents go in, a
//! schema-checked [`QueryPlan`] comes out.

pub mod aggregate;
pub mod args;
pub mod order;
pub mod plan;
pub mod predicate;
pub mod scope;
pub mod selection;
pub mod unique;
pub mod write;

mod context;
mod error;
mod operand;
mod planner;

#[cfg(test)]
mod tests;

pub use context::PlanContext;
pub use error::ValidateError;
pub use plan::{Operation, OperationKind, QueryPlan, ReadPlan};

pub(crate) use planner::Planner;

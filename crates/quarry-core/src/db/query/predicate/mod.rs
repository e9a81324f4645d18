//! Filter documents and the predicate trees built from them.

mod build;
mod model;
mod render;

#[cfg(test)]
mod tests;

pub use build::{MAX_IN_LIST, MAX_PREDICATE_DEPTH, build_predicate};
pub use model::{CompareOp, ComparePredicate, Predicate, Quantifier, RelationPredicate};
pub use render::render_filter;

pub(crate) use build::PredicateBuilder;

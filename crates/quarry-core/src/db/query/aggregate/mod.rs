//! Aggregate outputs, group-by keys and HAVING filters.

mod build;
mod model;

#[cfg(test)]
mod tests;

pub use model::{
    AggregateCondition, AggregateFn, AggregateSelection, COUNT_ALL, GroupBySpec, Having,
};

pub(crate) use build::{AggregateInputs, GroupByInputs, build_aggregates, build_group_by};

use crate::{
    db::query::{
        ValidateError,
        order::OrderTerm,
        predicate::{CompareOp, Predicate},
    },
    model::{EntityModel, FieldModel, ScalarType},
    value::Value,
};
use std::fmt::{self, Display};

/// Pseudo-field naming "every row" in `_count` selections.
pub const COUNT_ALL: &str = "_all";

///
/// AggregateFn
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AggregateFn {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateFn {
    pub const ALL: [Self; 5] = [Self::Count, Self::Min, Self::Max, Self::Sum, Self::Avg];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Count => "_count",
            Self::Min => "_min",
            Self::Max => "_max",
            Self::Sum => "_sum",
            Self::Avg => "_avg",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Whether this function can be applied to `field`.
    #[must_use]
    pub const fn applies_to(self, field: &FieldModel) -> bool {
        match self {
            Self::Count => true,
            Self::Min | Self::Max => !field.list && field.ty.is_orderable(),
            Self::Sum | Self::Avg => !field.list && field.ty.is_numeric(),
        }
    }

    /// Declared type of this function's output over `field`.
    ///
    /// Decimal sums and averages stay decimal; integer averages are floats.
    #[must_use]
    pub fn output_type(self, field: Option<&FieldModel>) -> ScalarType {
        match (self, field) {
            (Self::Count, _) | (_, None) => ScalarType::Int,
            (Self::Avg, Some(f)) if f.ty == ScalarType::Int => ScalarType::Float,
            (_, Some(f)) => f.ty.clone(),
        }
    }

    pub(crate) fn check_field(self, entity: &EntityModel, name: &str) -> Result<(), ValidateError> {
        if self == Self::Count && name == COUNT_ALL {
            return Ok(());
        }
        let field = entity.field(name).ok_or_else(|| ValidateError::UnknownField {
            entity: entity.name.clone(),
            field: name.to_string(),
        })?;

        if self.applies_to(field) {
            Ok(())
        } else {
            Err(ValidateError::AggregateNotApplicable {
                entity: entity.name.clone(),
                field: name.to_string(),
                function: self.key(),
                ty: field.type_label(),
            })
        }
    }
}

impl Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

///
/// AggregateSelection
///
/// Requested aggregate outputs. `count` may contain `_all`.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregateSelection {
    pub count: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub sum: Vec<String>,
    pub avg: Vec<String>,
}

impl AggregateSelection {
    #[must_use]
    pub fn fields(&self, function: AggregateFn) -> &[String] {
        match function {
            AggregateFn::Count => &self.count,
            AggregateFn::Min => &self.min,
            AggregateFn::Max => &self.max,
            AggregateFn::Sum => &self.sum,
            AggregateFn::Avg => &self.avg,
        }
    }

    pub(crate) fn fields_mut(&mut self, function: AggregateFn) -> &mut Vec<String> {
        match function {
            AggregateFn::Count => &mut self.count,
            AggregateFn::Min => &mut self.min,
            AggregateFn::Max => &mut self.max,
            AggregateFn::Sum => &mut self.sum,
            AggregateFn::Avg => &mut self.avg,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        AggregateFn::ALL.iter().all(|f| self.fields(*f).is_empty())
    }

    /// Every (function, field) pair, in function order.
    pub fn pairs(&self) -> impl Iterator<Item = (AggregateFn, &str)> {
        AggregateFn::ALL
            .into_iter()
            .flat_map(move |f| self.fields(f).iter().map(move |name| (f, name.as_str())))
    }
}

///
/// Having
///
/// Post-aggregation filter over groups.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Having {
    #[default]
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),

    /// Condition on grouping key values.
    Key(Predicate),
    Aggregate(AggregateCondition),
}

///
/// AggregateCondition
///

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateCondition {
    pub function: AggregateFn,
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

///
/// GroupBySpec
///

#[derive(Clone, Debug, PartialEq)]
pub struct GroupBySpec {
    pub by: Vec<String>,
    pub having: Having,
    pub order: Vec<OrderTerm>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub aggregates: AggregateSelection,
}

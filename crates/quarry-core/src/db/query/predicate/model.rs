use crate::value::{TextMode, Value};
use std::fmt::{self, Display};

///
/// Predicate
///
/// Boolean filter tree scoped to one entity. Relation nodes carry a nested
/// predicate scoped to the related entity.
///
/// True  → matches every row (`{}`, empty `AND`, empty `NOT`).
/// False → matches no row (empty `OR`).
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Predicate {
    #[default]
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(ComparePredicate),
    IsNull { field: String },
    IsNotNull { field: String },
    IsEmpty { field: String },
    Relation(RelationPredicate),
}

impl Predicate {
    #[must_use]
    pub const fn is_trivially_true(&self) -> bool {
        matches!(self, Self::True)
    }

    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(ComparePredicate {
            field: field.into(),
            op,
            value: value.into(),
            mode: TextMode::Default,
        })
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Conjunction that collapses trivial members.
    #[must_use]
    pub fn and(parts: Vec<Self>) -> Self {
        let mut parts: Vec<Self> = parts.into_iter().filter(|p| !p.is_trivially_true()).collect();
        match parts.len() {
            0 => Self::True,
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    /// Nesting depth, counting every composite and relation hop.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::And(parts) | Self::Or(parts) => {
                1 + parts.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Not(inner) => 1 + inner.depth(),
            Self::Relation(rel) => 1 + rel.predicate.depth(),
            _ => 1,
        }
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Has,
    HasEvery,
    HasSome,
}

impl CompareOp {
    /// Input key for this operator in filter documents.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Eq => "equals",
            Self::Ne => "not",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Has => "has",
            Self::HasEvery => "hasEvery",
            Self::HasSome => "hasSome",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "equals" => Self::Eq,
            "not" => Self::Ne,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "contains" => Self::Contains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "has" => Self::Has,
            "hasEvery" => Self::HasEvery,
            "hasSome" => Self::HasSome,
            _ => return None,
        };

        Some(op)
    }

    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    #[must_use]
    pub const fn is_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Operators that test the elements of a list field.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::Has | Self::HasEvery | Self::HasSome)
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

///
/// ComparePredicate
///

#[derive(Clone, Debug, PartialEq)]
pub struct ComparePredicate {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
    pub mode: TextMode,
}

///
/// Quantifier
///
/// Is/IsNot apply to to-one relations, Some/Every/None to to-many.
/// `IsNot(True)` is "relation absent".
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Quantifier {
    Is,
    IsNot,
    Some,
    Every,
    None,
}

impl Quantifier {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "isNot",
            Self::Some => "some",
            Self::Every => "every",
            Self::None => "none",
        }
    }

    #[must_use]
    pub const fn is_to_many(self) -> bool {
        matches!(self, Self::Some | Self::Every | Self::None)
    }
}

///
/// RelationPredicate
///

#[derive(Clone, Debug, PartialEq)]
pub struct RelationPredicate {
    pub relation: String,
    pub quantifier: Quantifier,
    pub predicate: Box<Predicate>,
}

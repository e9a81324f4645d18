//! Logical plans handed to the backend.
//!
//! A plan is fully validated against the schema before it leaves the
//! client; backends execute it verbatim.

use crate::db::query::{
    aggregate::{AggregateSelection, GroupBySpec},
    order::OrderTerm,
    predicate::Predicate,
    scope::Scope,
    selection::Selection,
    unique::UniqueWhere,
    write::{CreateData, UpdateData},
};
use std::fmt::{self, Display};

///
/// QueryPlan
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub entity: String,
    pub operation: Operation,
}

impl QueryPlan {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Selection that shapes the rows this plan returns, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<&Selection> {
        match &self.operation {
            Operation::FindUnique { selection, .. }
            | Operation::Create { selection, .. }
            | Operation::Update { selection, .. }
            | Operation::Upsert { selection, .. }
            | Operation::Delete { selection, .. } => Some(selection),
            Operation::FindFirst(read) | Operation::FindMany(read) => Some(&read.selection),
            Operation::CreateMany { .. }
            | Operation::UpdateMany { .. }
            | Operation::DeleteMany { .. }
            | Operation::Count { .. }
            | Operation::Aggregate { .. }
            | Operation::GroupBy { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        self.kind().is_write()
    }
}

///
/// ReadPlan
///

#[derive(Clone, Debug, PartialEq)]
pub struct ReadPlan {
    pub scope: Scope,
    pub selection: Selection,
}

///
/// Operation
///
/// `limit` on bulk writes caps the affected rows; without an `order` the
/// rows chosen are backend-defined.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    FindUnique {
        target: UniqueWhere,
        selection: Selection,
    },
    FindFirst(ReadPlan),
    FindMany(ReadPlan),
    Create {
        data: CreateData,
        selection: Selection,
    },
    CreateMany {
        rows: Vec<CreateData>,
        skip_duplicates: bool,
    },
    Update {
        target: UniqueWhere,
        data: UpdateData,
        selection: Selection,
    },
    UpdateMany {
        filter: Predicate,
        data: UpdateData,
        limit: Option<u64>,
        order: Vec<OrderTerm>,
    },
    Upsert {
        target: UniqueWhere,
        create: CreateData,
        update: UpdateData,
        selection: Selection,
    },
    Delete {
        target: UniqueWhere,
        selection: Selection,
    },
    DeleteMany {
        filter: Predicate,
        limit: Option<u64>,
        order: Vec<OrderTerm>,
    },
    Count {
        scope: Scope,
        /// Per-field non-null counts; `None` counts rows.
        fields: Option<Vec<String>>,
    },
    Aggregate {
        scope: Scope,
        aggregates: AggregateSelection,
    },
    GroupBy {
        filter: Predicate,
        spec: GroupBySpec,
    },
}

impl Operation {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::FindUnique { .. } => OperationKind::FindUnique,
            Self::FindFirst(_) => OperationKind::FindFirst,
            Self::FindMany(_) => OperationKind::FindMany,
            Self::Create { .. } => OperationKind::Create,
            Self::CreateMany { .. } => OperationKind::CreateMany,
            Self::Update { .. } => OperationKind::Update,
            Self::UpdateMany { .. } => OperationKind::UpdateMany,
            Self::Upsert { .. } => OperationKind::Upsert,
            Self::Delete { .. } => OperationKind::Delete,
            Self::DeleteMany { .. } => OperationKind::DeleteMany,
            Self::Count { .. } => OperationKind::Count,
            Self::Aggregate { .. } => OperationKind::Aggregate,
            Self::GroupBy { .. } => OperationKind::GroupBy,
        }
    }
}

///
/// OperationKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperationKind {
    FindUnique,
    FindFirst,
    FindMany,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    Count,
    Aggregate,
    GroupBy,
    ExecuteRaw,
    QueryRaw,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindUnique => "findUnique",
            Self::FindFirst => "findFirst",
            Self::FindMany => "findMany",
            Self::Create => "create",
            Self::CreateMany => "createMany",
            Self::Update => "update",
            Self::UpdateMany => "updateMany",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
            Self::Count => "count",
            Self::Aggregate => "aggregate",
            Self::GroupBy => "groupBy",
            Self::ExecuteRaw => "executeRaw",
            Self::QueryRaw => "queryRaw",
        }
    }

    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Create
                | Self::CreateMany
                | Self::Update
                | Self::UpdateMany
                | Self::Upsert
                | Self::Delete
                | Self::DeleteMany
                | Self::ExecuteRaw
        )
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

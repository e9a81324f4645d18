//! Execution backends.
//!
//! A backend receives fully validated [`QueryPlan`]s and returns raw rows.
//! It owns storage, defaults, constraint enforcement and atomicity; the
//! client owns validation and result shaping.

pub mod memory;

use crate::{
    config::TransactionOptions,
    db::query::{OperationKind, QueryPlan, aggregate::AggregateFn},
    value::Value,
};
use async_trait::async_trait;
use derive_more::Deref;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// Backend
///

#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute one plan atomically.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        plan: &QueryPlan,
    ) -> Result<RawResult, BackendError>;

    /// Run a raw statement with positional `$n` parameters; returns the
    /// affected row count.
    async fn execute_raw(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> Result<u64, BackendError>;

    /// Run a raw query with positional `$n` parameters.
    async fn query_raw(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<RawRow>, BackendError>;
}

///
/// ExecutionContext
///
/// Per-call metadata travelling with a plan. `id` is unique per client.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionContext {
    pub id: u64,
    pub entity: Option<String>,
    pub operation: OperationKind,
    pub transaction: TransactionOptions,
}

///
/// RawRow
///
/// One backend row keyed by field or relation name. Relation counts
/// travel under `_count` as a nested row.
///

#[derive(Clone, Debug, Default, Deref, PartialEq)]
pub struct RawRow(BTreeMap<String, RawCell>);

impl RawRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, cell: RawCell) {
        self.0.insert(key.into(), cell);
    }

    /// Builder-style insert of a scalar cell.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, RawCell::Value(value.into()));
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<RawCell> {
        self.0.remove(key)
    }
}

impl FromIterator<(String, RawCell)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, RawCell)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

///
/// RawCell
///

#[derive(Clone, Debug, PartialEq)]
pub enum RawCell {
    Value(Value),
    One(Option<RawRow>),
    Many(Vec<RawRow>),
}

impl From<Value> for RawCell {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

///
/// AggregateRow
///
/// Aggregate outputs keyed by function, then by field (`_all` for rows).
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateRow(pub BTreeMap<AggregateFn, BTreeMap<String, Value>>);

impl AggregateRow {
    pub fn insert(&mut self, function: AggregateFn, field: impl Into<String>, value: Value) {
        self.0.entry(function).or_default().insert(field.into(), value);
    }

    #[must_use]
    pub fn get(&self, function: AggregateFn, field: &str) -> Option<&Value> {
        self.0.get(&function).and_then(|fields| fields.get(field))
    }
}

///
/// GroupRow
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupRow {
    pub keys: Vec<(String, Value)>,
    pub aggregates: AggregateRow,
}

///
/// RawResult
///

#[derive(Clone, Debug, PartialEq)]
pub enum RawResult {
    Rows(Vec<RawRow>),
    Row(Option<RawRow>),
    Count(u64),
    CountFields(Vec<(String, u64)>),
    Aggregate(AggregateRow),
    Groups(Vec<GroupRow>),
    Affected(u64),
}

impl RawResult {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Row(_) => "row",
            Self::Count(_) => "count",
            Self::CountFields(_) => "count fields",
            Self::Aggregate(_) => "aggregate",
            Self::Groups(_) => "groups",
            Self::Affected(_) => "affected count",
        }
    }
}

///
/// BackendError
///
/// Failures reported by a backend. The dispatcher maps these into the
/// public error taxonomy.
///

#[derive(Debug, ThisError)]
pub enum BackendError {
    #[error("unique constraint violated")]
    UniqueViolation {
        constraint: Option<String>,
        fields: Vec<String>,
    },

    #[error("foreign key constraint violated")]
    ForeignKeyViolation {
        constraint: Option<String>,
        fields: Vec<String>,
        detail: Option<String>,
    },

    #[error("check constraint violated: {detail}")]
    CheckViolation {
        constraint: Option<String>,
        detail: String,
    },

    #[error("record not found: {detail}")]
    RecordNotFound { entity: String, detail: String },

    #[error("unsupported by this backend: {0}")]
    Unsupported(String),

    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BackendError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            source: None,
        }
    }
}

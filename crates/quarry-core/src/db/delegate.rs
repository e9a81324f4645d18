//! Per-entity operations.
//!
//! Every call runs the same lifecycle: arguments are built and validated
//! into a plan, the plan is dispatched, and the raw result is shaped. Each
//! phase emits a debug event carrying the entity and operation.

use crate::{
    db::{
        backend::RawResult,
        client::Client,
        query::{
            Operation, OperationKind, Planner, QueryPlan, ValidateError,
            args::{
                AggregateArgs, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs,
                FindManyArgs, FindUniqueArgs, GroupByArgs, IntoArgs, UpdateArgs, UpdateManyArgs,
                UpsertArgs,
            },
        },
        response::{Record, shape_aggregate, shape_groups, shape_row},
    },
    error::{BackendFailure, Error, NotFoundError},
    model::EntityModel,
};
use serde::{Deserialize, Serialize};

///
/// BatchPayload
///
/// Result of a bulk write.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BatchPayload {
    pub count: u64,
}

///
/// CountResult
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CountResult {
    Total(u64),

    /// Per-key counts in request order; `_all` counts rows.
    Fields(Vec<(String, u64)>),
}

impl CountResult {
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        match self {
            Self::Total(n) => Some(*n),
            Self::Fields(_) => None,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<u64> {
        match self {
            Self::Total(_) => None,
            Self::Fields(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, n)| *n),
        }
    }
}

///
/// Delegate
///

#[derive(Clone, Copy)]
pub struct Delegate<'c> {
    client: &'c Client,
    entity: &'c EntityModel,
}

impl<'c> Delegate<'c> {
    pub(crate) const fn new(client: &'c Client, entity: &'c EntityModel) -> Self {
        Self { client, entity }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    #[must_use]
    pub const fn model(&self) -> &'c EntityModel {
        self.entity
    }

    //
    // Reads
    //

    pub async fn find_unique(&self, args: impl IntoArgs<FindUniqueArgs>) -> Result<Option<Record>, Error> {
        let plan = self.build(OperationKind::FindUnique, args, |p, a| p.find_unique(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_one(&plan, raw)
    }

    /// `find_unique`, failing with `NotFound` instead of returning `None`.
    pub async fn find_unique_or_throw(&self, args: impl IntoArgs<FindUniqueArgs>) -> Result<Record, Error> {
        self.find_unique(args)
            .await?
            .ok_or_else(|| self.not_found("findUniqueOrThrow"))
    }

    pub async fn find_first(&self, args: impl IntoArgs<FindManyArgs>) -> Result<Option<Record>, Error> {
        let plan = self.build(OperationKind::FindFirst, args, |p, a| p.find_first(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_one(&plan, raw)
    }

    pub async fn find_first_or_throw(&self, args: impl IntoArgs<FindManyArgs>) -> Result<Record, Error> {
        self.find_first(args)
            .await?
            .ok_or_else(|| self.not_found("findFirstOrThrow"))
    }

    pub async fn find_many(&self, args: impl IntoArgs<FindManyArgs>) -> Result<Vec<Record>, Error> {
        let plan = self.build(OperationKind::FindMany, args, |p, a| p.find_many(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_many(&plan, raw)
    }

    //
    // Writes
    //

    pub async fn create(&self, args: impl IntoArgs<CreateArgs>) -> Result<Record, Error> {
        let plan = self.build(OperationKind::Create, args, |p, a| p.create(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_written(&plan, raw)
    }

    pub async fn create_many(&self, args: impl IntoArgs<CreateManyArgs>) -> Result<BatchPayload, Error> {
        let plan = self.build(OperationKind::CreateMany, args, |p, a| p.create_many(a))?;
        let raw = self.dispatch(&plan).await?;

        self.batch(&plan, raw)
    }

    pub async fn update(&self, args: impl IntoArgs<UpdateArgs>) -> Result<Record, Error> {
        let plan = self.build(OperationKind::Update, args, |p, a| p.update(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_written(&plan, raw)
    }

    pub async fn update_many(&self, args: impl IntoArgs<UpdateManyArgs>) -> Result<BatchPayload, Error> {
        let plan = self.build(OperationKind::UpdateMany, args, |p, a| p.update_many(a))?;
        let raw = self.dispatch(&plan).await?;

        self.batch(&plan, raw)
    }

    /// Create or update in a single plan; the backend checks existence.
    pub async fn upsert(&self, args: impl IntoArgs<UpsertArgs>) -> Result<Record, Error> {
        let plan = self.build(OperationKind::Upsert, args, |p, a| p.upsert(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_written(&plan, raw)
    }

    /// Delete one row; returns it as it was before deletion.
    pub async fn delete(&self, args: impl IntoArgs<DeleteArgs>) -> Result<Record, Error> {
        let plan = self.build(OperationKind::Delete, args, |p, a| p.delete(a))?;
        let raw = self.dispatch(&plan).await?;

        self.shape_written(&plan, raw)
    }

    pub async fn delete_many(&self, args: impl IntoArgs<DeleteManyArgs>) -> Result<BatchPayload, Error> {
        let plan = self.build(OperationKind::DeleteMany, args, |p, a| p.delete_many(a))?;
        let raw = self.dispatch(&plan).await?;

        self.batch(&plan, raw)
    }

    //
    // Aggregates
    //

    pub async fn count(&self, args: impl IntoArgs<CountArgs>) -> Result<CountResult, Error> {
        let plan = self.build(OperationKind::Count, args, |p, a| p.count(a))?;
        let raw = self.dispatch(&plan).await?;

        let result = match raw {
            RawResult::Count(n) => CountResult::Total(n),
            RawResult::CountFields(fields) => CountResult::Fields(fields),
            other => return Err(self.unexpected(&plan, &other)),
        };
        self.shaped(&plan, 1);

        Ok(result)
    }

    pub async fn aggregate(&self, args: impl IntoArgs<AggregateArgs>) -> Result<Record, Error> {
        let plan = self.build(OperationKind::Aggregate, args, |p, a| p.aggregate(a))?;
        let raw = self.dispatch(&plan).await?;

        let (Operation::Aggregate { aggregates, .. }, RawResult::Aggregate(row)) = (&plan.operation, &raw) else {
            return Err(self.unexpected(&plan, &raw));
        };
        let record = shape_aggregate(self.entity, aggregates, row)?;
        self.shaped(&plan, 1);

        Ok(record)
    }

    pub async fn group_by(&self, args: impl IntoArgs<GroupByArgs>) -> Result<Vec<Record>, Error> {
        let plan = self.build(OperationKind::GroupBy, args, |p, a| p.group_by(a))?;
        let raw = self.dispatch(&plan).await?;

        let (Operation::GroupBy { spec, .. }, RawResult::Groups(groups)) = (&plan.operation, raw) else {
            return Err(BackendFailure::malformed(&self.entity.name, "expected groups for groupBy").into());
        };
        let records = shape_groups(self.entity, spec, groups)?;
        self.shaped(&plan, records.len());

        Ok(records)
    }

    //
    // Lifecycle
    //

    fn build<A>(
        &self,
        kind: OperationKind,
        args: impl IntoArgs<A>,
        plan: impl FnOnce(&Planner<'_>, &A) -> Result<QueryPlan, ValidateError>,
    ) -> Result<QueryPlan, Error> {
        let args = args.into_args(kind.as_str())?;
        tracing::debug!(entity = %self.entity.name, operation = %kind, "built");

        let planner = Planner::new(self.client.context(), &self.entity.name)?;
        let plan = plan(&planner, &args).inspect_err(|err| {
            tracing::debug!(
                entity = %self.entity.name,
                operation = %kind,
                code = err.code(),
                "rejected"
            );
        })?;
        tracing::debug!(entity = %self.entity.name, operation = %kind, "validated");

        Ok(plan)
    }

    async fn dispatch(&self, plan: &QueryPlan) -> Result<RawResult, Error> {
        self.client.dispatcher().dispatch(plan).await
    }

    fn shaped(&self, plan: &QueryPlan, rows: usize) {
        tracing::debug!(entity = %self.entity.name, operation = %plan.kind(), rows, "shaped");
    }

    fn shape_one(&self, plan: &QueryPlan, raw: RawResult) -> Result<Option<Record>, Error> {
        let row = match raw {
            RawResult::Row(row) => row,
            other => return Err(self.unexpected(plan, &other)),
        };
        let Some(selection) = plan.selection() else {
            return Err(BackendFailure::malformed(&self.entity.name, "plan has no selection").into());
        };
        let record = row
            .map(|row| shape_row(self.client.schema(), row, selection))
            .transpose()?;
        self.shaped(plan, usize::from(record.is_some()));

        Ok(record)
    }

    fn shape_many(&self, plan: &QueryPlan, raw: RawResult) -> Result<Vec<Record>, Error> {
        let (Some(selection), RawResult::Rows(rows)) = (plan.selection(), raw) else {
            return Err(BackendFailure::malformed(&self.entity.name, "expected rows").into());
        };
        let records = rows
            .into_iter()
            .map(|row| shape_row(self.client.schema(), row, selection))
            .collect::<Result<Vec<_>, _>>()?;
        self.shaped(plan, records.len());

        Ok(records)
    }

    // Targeted writes always return the affected row.
    fn shape_written(&self, plan: &QueryPlan, raw: RawResult) -> Result<Record, Error> {
        self.shape_one(plan, raw)?
            .ok_or_else(|| self.not_found(plan.kind().as_str()))
    }

    fn batch(&self, plan: &QueryPlan, raw: RawResult) -> Result<BatchPayload, Error> {
        let RawResult::Affected(count) = raw else {
            return Err(self.unexpected(plan, &raw));
        };
        self.shaped(plan, 1);

        Ok(BatchPayload { count })
    }

    fn not_found(&self, operation: &str) -> Error {
        NotFoundError::new(&self.entity.name, operation).into()
    }

    fn unexpected(&self, plan: &QueryPlan, raw: &RawResult) -> Error {
        BackendFailure::malformed(
            &self.entity.name,
            format!("{} returned {}", plan.kind(), raw.label()),
        )
        .into()
    }
}

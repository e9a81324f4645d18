use crate::{
    db::query::{
        ValidateError,
        aggregate::{AggregateInputs, COUNT_ALL, GroupByInputs, build_aggregates, build_group_by},
        args::{
            AggregateArgs, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs,
            FindManyArgs, FindUniqueArgs, GroupByArgs, UpdateArgs, UpdateManyArgs, UpsertArgs,
        },
        context::PlanContext,
        order::{OrderTerm, build_order},
        plan::{Operation, QueryPlan, ReadPlan},
        predicate::{Predicate, PredicateBuilder},
        scope::{CursorOrder, ScopeInputs, build_scope},
        selection::{Selection, SelectionArgs, build_selection},
        unique::build_unique_where,
        write::WriteBuilder,
    },
    model::EntityModel,
};
use serde_json::Value as Json;

///
/// Planner
///
/// Validates one call's arguments against the schema and assembles the
/// plan. Nothing here touches the backend.
///

pub(crate) struct Planner<'a> {
    ctx: PlanContext<'a>,
    entity: &'a EntityModel,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(ctx: PlanContext<'a>, entity: &str) -> Result<Self, ValidateError> {
        let entity = ctx
            .schema
            .entity(entity)
            .ok_or_else(|| ValidateError::UnknownEntity(entity.to_string()))?;

        Ok(Self { ctx, entity })
    }

    //
    // Reads
    //

    pub(crate) fn find_unique(&self, args: &FindUniqueArgs) -> Result<QueryPlan, ValidateError> {
        let target = build_unique_where(self.ctx.schema, self.entity, &args.filter)?;
        let selection = self.selection(args.select.as_ref(), args.include.as_ref(), args.omit.as_ref())?;

        Ok(self.plan(Operation::FindUnique { target, selection }))
    }

    /// `find_many` limited to one row; a cursor must come with `orderBy`.
    pub(crate) fn find_first(&self, args: &FindManyArgs) -> Result<QueryPlan, ValidateError> {
        let mut read = self.read(args, CursorOrder::Reject)?;
        read.scope.take = Some(if args.take.is_some_and(|take| take < 0) { -1 } else { 1 });

        Ok(self.plan(Operation::FindFirst(read)))
    }

    pub(crate) fn find_many(&self, args: &FindManyArgs) -> Result<QueryPlan, ValidateError> {
        let read = self.read(args, CursorOrder::PrimaryKey)?;

        Ok(self.plan(Operation::FindMany(read)))
    }

    fn read(&self, args: &FindManyArgs, cursor_order: CursorOrder) -> Result<ReadPlan, ValidateError> {
        let scope = build_scope(
            self.ctx.schema,
            self.entity,
            ScopeInputs {
                filter: args.filter.as_ref(),
                order_by: args.order_by.as_ref(),
                cursor: args.cursor.as_ref(),
                take: args.take,
                skip: args.skip,
                distinct: args.distinct.as_ref(),
            },
            cursor_order,
        )?;
        let selection = self.selection(args.select.as_ref(), args.include.as_ref(), args.omit.as_ref())?;

        Ok(ReadPlan { scope, selection })
    }

    //
    // Writes
    //

    pub(crate) fn create(&self, args: &CreateArgs) -> Result<QueryPlan, ValidateError> {
        let data = WriteBuilder::new(self.ctx.schema).create(self.entity, &args.data)?;
        let selection = self.selection(args.select.as_ref(), args.include.as_ref(), args.omit.as_ref())?;

        Ok(self.plan(Operation::Create { data, selection }))
    }

    pub(crate) fn create_many(&self, args: &CreateManyArgs) -> Result<QueryPlan, ValidateError> {
        let builder = WriteBuilder::flat(self.ctx.schema);
        let rows = args
            .data
            .iter()
            .map(|row| builder.create(self.entity, row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.plan(Operation::CreateMany {
            rows,
            skip_duplicates: args.skip_duplicates,
        }))
    }

    pub(crate) fn update(&self, args: &UpdateArgs) -> Result<QueryPlan, ValidateError> {
        let target = build_unique_where(self.ctx.schema, self.entity, &args.filter)?;
        let data = WriteBuilder::new(self.ctx.schema).update(self.entity, &args.data)?;
        let selection = self.selection(args.select.as_ref(), args.include.as_ref(), args.omit.as_ref())?;

        Ok(self.plan(Operation::Update {
            target,
            data,
            selection,
        }))
    }

    pub(crate) fn update_many(&self, args: &UpdateManyArgs) -> Result<QueryPlan, ValidateError> {
        let filter = self.filter(args.filter.as_ref())?;
        let data = WriteBuilder::flat(self.ctx.schema).update(self.entity, &args.data)?;
        let order = self.bulk_order(args.limit, args.order_by.as_ref())?;

        Ok(self.plan(Operation::UpdateMany {
            filter,
            data,
            limit: args.limit,
            order,
        }))
    }

    pub(crate) fn upsert(&self, args: &UpsertArgs) -> Result<QueryPlan, ValidateError> {
        let target = build_unique_where(self.ctx.schema, self.entity, &args.filter)?;
        let writes = WriteBuilder::new(self.ctx.schema);
        let create = writes.create(self.entity, &args.create)?;
        let update = writes.update(self.entity, &args.update)?;
        let selection = self.selection(args.select.as_ref(), args.include.as_ref(), args.omit.as_ref())?;

        Ok(self.plan(Operation::Upsert {
            target,
            create,
            update,
            selection,
        }))
    }

    pub(crate) fn delete(&self, args: &DeleteArgs) -> Result<QueryPlan, ValidateError> {
        let target = build_unique_where(self.ctx.schema, self.entity, &args.filter)?;
        let selection = self.selection(args.select.as_ref(), args.include.as_ref(), args.omit.as_ref())?;

        Ok(self.plan(Operation::Delete { target, selection }))
    }

    pub(crate) fn delete_many(&self, args: &DeleteManyArgs) -> Result<QueryPlan, ValidateError> {
        let filter = self.filter(args.filter.as_ref())?;
        let order = self.bulk_order(args.limit, args.order_by.as_ref())?;

        Ok(self.plan(Operation::DeleteMany {
            filter,
            limit: args.limit,
            order,
        }))
    }

    //
    // Aggregates
    //

    pub(crate) fn count(&self, args: &CountArgs) -> Result<QueryPlan, ValidateError> {
        let scope = build_scope(
            self.ctx.schema,
            self.entity,
            ScopeInputs {
                filter: args.filter.as_ref(),
                order_by: args.order_by.as_ref(),
                cursor: args.cursor.as_ref(),
                take: args.take,
                skip: args.skip,
                distinct: None,
            },
            CursorOrder::PrimaryKey,
        )?;
        let fields = match args.select.as_ref() {
            Some(raw) if !raw.is_null() => Some(self.count_fields(raw)?),
            _ => None,
        };

        Ok(self.plan(Operation::Count { scope, fields }))
    }

    fn count_fields(&self, raw: &Json) -> Result<Vec<String>, ValidateError> {
        let Json::Object(map) = raw else {
            return Err(ValidateError::ExpectedShape {
                entity: self.entity.name.clone(),
                path: "select".to_string(),
                expected: "an object of field flags",
            });
        };

        let mut fields = Vec::new();
        for (name, flag) in map {
            if name != COUNT_ALL && self.entity.field(name).is_none() {
                return Err(ValidateError::UnknownField {
                    entity: self.entity.name.clone(),
                    field: name.clone(),
                });
            }
            match flag {
                Json::Bool(true) => fields.push(name.clone()),
                Json::Bool(false) => {}
                _ => {
                    return Err(ValidateError::ExpectedShape {
                        entity: self.entity.name.clone(),
                        path: format!("select.{name}"),
                        expected: "a boolean",
                    });
                }
            }
        }

        Ok(fields)
    }

    pub(crate) fn aggregate(&self, args: &AggregateArgs) -> Result<QueryPlan, ValidateError> {
        let scope = build_scope(
            self.ctx.schema,
            self.entity,
            ScopeInputs {
                filter: args.filter.as_ref(),
                order_by: args.order_by.as_ref(),
                cursor: args.cursor.as_ref(),
                take: args.take,
                skip: args.skip,
                distinct: None,
            },
            CursorOrder::PrimaryKey,
        )?;
        let aggregates = build_aggregates(
            self.entity,
            AggregateInputs {
                count: args.count.as_ref(),
                min: args.min.as_ref(),
                max: args.max.as_ref(),
                sum: args.sum.as_ref(),
                avg: args.avg.as_ref(),
            },
        )?;

        Ok(self.plan(Operation::Aggregate { scope, aggregates }))
    }

    pub(crate) fn group_by(&self, args: &GroupByArgs) -> Result<QueryPlan, ValidateError> {
        let filter = self.filter(args.filter.as_ref())?;
        let spec = build_group_by(
            self.ctx.schema,
            self.entity,
            GroupByInputs {
                by: &args.by,
                having: args.having.as_ref(),
                order_by: args.order_by.as_ref(),
                take: args.take,
                skip: args.skip,
                aggregates: AggregateInputs {
                    count: args.count.as_ref(),
                    min: args.min.as_ref(),
                    max: args.max.as_ref(),
                    sum: args.sum.as_ref(),
                    avg: args.avg.as_ref(),
                },
            },
        )?;

        Ok(self.plan(Operation::GroupBy { filter, spec }))
    }

    //
    // Helpers
    //

    fn plan(&self, operation: Operation) -> QueryPlan {
        QueryPlan {
            entity: self.entity.name.clone(),
            operation,
        }
    }

    fn filter(&self, raw: Option<&Json>) -> Result<Predicate, ValidateError> {
        match raw {
            Some(raw) if !raw.is_null() => PredicateBuilder::new(self.ctx.schema).filter(self.entity, raw),
            _ => Ok(Predicate::True),
        }
    }

    fn selection(
        &self,
        select: Option<&Json>,
        include: Option<&Json>,
        omit: Option<&Json>,
    ) -> Result<Selection, ValidateError> {
        build_selection(self.ctx, self.entity, SelectionArgs { select, include, omit })
    }

    fn bulk_order(&self, limit: Option<u64>, raw: Option<&Json>) -> Result<Vec<OrderTerm>, ValidateError> {
        let order = match raw {
            Some(raw) if !raw.is_null() => build_order(self.ctx.schema, self.entity, raw, false)?,
            _ => Vec::new(),
        };
        if limit.is_some() && order.is_empty() {
            tracing::debug!(
                entity = %self.entity.name,
                "limit without orderBy: the affected rows are chosen by the backend"
            );
        }

        Ok(order)
    }
}

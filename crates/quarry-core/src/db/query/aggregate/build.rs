use crate::{
    db::query::{
        ValidateError,
        aggregate::{
            AggregateCondition, AggregateFn, AggregateSelection, COUNT_ALL, GroupBySpec, Having,
        },
        order::{OrderTarget, build_order},
        predicate::{CompareOp, MAX_PREDICATE_DEPTH, PredicateBuilder},
    },
    model::{EntityModel, ScalarType, Schema},
    value::Value,
};
use serde_json::{Map, Value as Json};

///
/// AggregateInputs
///
/// Raw `_count` / `_min` / `_max` / `_sum` / `_avg` arguments.
///

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct AggregateInputs<'a> {
    pub count: Option<&'a Json>,
    pub min: Option<&'a Json>,
    pub max: Option<&'a Json>,
    pub sum: Option<&'a Json>,
    pub avg: Option<&'a Json>,
}

impl<'a> AggregateInputs<'a> {
    const fn get(&self, function: AggregateFn) -> Option<&'a Json> {
        match function {
            AggregateFn::Count => self.count,
            AggregateFn::Min => self.min,
            AggregateFn::Max => self.max,
            AggregateFn::Sum => self.sum,
            AggregateFn::Avg => self.avg,
        }
    }
}

///
/// GroupByInputs
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct GroupByInputs<'a> {
    pub by: &'a Json,
    pub having: Option<&'a Json>,
    pub order_by: Option<&'a Json>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub aggregates: AggregateInputs<'a>,
}

/// Validate the requested aggregate outputs.
pub(crate) fn build_aggregates(
    entity: &EntityModel,
    inputs: AggregateInputs<'_>,
) -> Result<AggregateSelection, ValidateError> {
    let mut selection = AggregateSelection::default();

    for function in AggregateFn::ALL {
        let Some(raw) = inputs.get(function) else {
            continue;
        };
        let fields = selection.fields_mut(function);

        match raw {
            Json::Bool(true) if function == AggregateFn::Count => fields.push(COUNT_ALL.to_string()),
            Json::Bool(false) | Json::Null => {}
            Json::Object(map) => {
                for (name, flag) in map {
                    let Some(flag) = flag.as_bool() else {
                        return Err(shape(entity, &format!("{function}.{name}"), "a boolean"));
                    };
                    function.check_field(entity, name)?;
                    if flag {
                        fields.push(name.clone());
                    }
                }
            }
            _ => return Err(shape(entity, function.key(), "an object of field flags")),
        }
    }

    Ok(selection)
}

/// Validate a groupBy request.
///
/// Every scalar field referenced by `orderBy` or `having` must be one of
/// the `by` fields; aggregate references are always accepted. Pagination
/// requires an explicit `orderBy`.
pub(crate) fn build_group_by(
    schema: &Schema,
    entity: &EntityModel,
    inputs: GroupByInputs<'_>,
) -> Result<GroupBySpec, ValidateError> {
    let by = group_fields(entity, inputs.by)?;

    let order = match inputs.order_by {
        Some(raw) if !raw.is_null() => build_order(schema, entity, raw, true)?,
        _ => Vec::new(),
    };
    for term in &order {
        match &term.target {
            OrderTarget::Field(field) if !by.contains(field) => {
                return Err(ValidateError::FieldNotInGroupBy {
                    entity: entity.name.clone(),
                    field: field.clone(),
                    clause: "orderBy",
                });
            }
            OrderTarget::Relation { path, .. } => {
                return Err(relation_order(entity, &path.join(".")));
            }
            OrderTarget::RelationCount(relation) => return Err(relation_order(entity, relation)),
            OrderTarget::Field(_) | OrderTarget::Aggregate { .. } => {}
        }
    }

    if (inputs.take.is_some() || inputs.skip.is_some()) && order.is_empty() {
        return Err(ValidateError::PaginationWithoutOrder {
            entity: entity.name.clone(),
        });
    }

    let having = match inputs.having {
        Some(raw) if !raw.is_null() => HavingBuilder {
            schema,
            entity,
            by: &by,
        }
        .object(raw, 1)?,
        _ => Having::True,
    };

    let aggregates = build_aggregates(entity, inputs.aggregates)?;

    Ok(GroupBySpec {
        by,
        having,
        order,
        take: inputs.take,
        skip: inputs.skip,
        aggregates,
    })
}

fn group_fields(entity: &EntityModel, raw: &Json) -> Result<Vec<String>, ValidateError> {
    let names: Vec<&str> = match raw {
        Json::String(name) => vec![name.as_str()],
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| shape(entity, "by", "a field name or a list of field names"))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(shape(entity, "by", "a field name or a list of field names")),
    };

    if names.is_empty() {
        return Err(ValidateError::EmptyGroupBy {
            entity: entity.name.clone(),
        });
    }

    let mut by = Vec::with_capacity(names.len());
    for name in names {
        let field = entity.field(name).ok_or_else(|| ValidateError::UnknownField {
            entity: entity.name.clone(),
            field: name.to_string(),
        })?;
        if field.list || field.ty == ScalarType::Json {
            return Err(ValidateError::GroupByInvalidField {
                entity: entity.name.clone(),
                field: name.to_string(),
                reason: "list and Json fields cannot be grouping keys",
            });
        }
        if !by.iter().any(|b| b == name) {
            by.push(name.to_string());
        }
    }

    Ok(by)
}

///
/// HavingBuilder
///

struct HavingBuilder<'a> {
    schema: &'a Schema,
    entity: &'a EntityModel,
    by: &'a [String],
}

impl HavingBuilder<'_> {
    fn object(&self, raw: &Json, depth: usize) -> Result<Having, ValidateError> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(ValidateError::PredicateTooDeep {
                max: MAX_PREDICATE_DEPTH,
            });
        }
        let Json::Object(map) = raw else {
            return Err(shape(self.entity, "having", "a filter object"));
        };

        let mut parts = Vec::new();
        for (key, value) in map {
            match key.as_str() {
                "AND" | "OR" | "NOT" => parts.push(self.combinator(key, value, depth)?),
                _ => parts.extend(self.field(key, value)?),
            }
        }

        Ok(match parts.len() {
            0 => Having::True,
            1 => parts.remove(0),
            _ => Having::And(parts),
        })
    }

    fn combinator(&self, key: &str, value: &Json, depth: usize) -> Result<Having, ValidateError> {
        let children = match value {
            Json::Array(items) => items
                .iter()
                .map(|item| self.object(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?,
            Json::Object(_) => {
                let child = self.object(value, depth + 1)?;
                return Ok(if key == "NOT" {
                    Having::Not(Box::new(child))
                } else {
                    child
                });
            }
            _ => return Err(shape(self.entity, key, "an object or a list of objects")),
        };

        Ok(match (key, children.len()) {
            ("AND" | "NOT", 0) => Having::True,
            ("OR", 0) => Having::False,
            ("AND", _) => Having::And(children),
            ("OR", _) => Having::Or(children),
            (_, 1) => Having::Not(Box::new(children.into_iter().next().unwrap_or_default())),
            _ => Having::And(
                children
                    .into_iter()
                    .map(|c| Having::Not(Box::new(c)))
                    .collect(),
            ),
        })
    }

    fn field(&self, name: &str, value: &Json) -> Result<Vec<Having>, ValidateError> {
        let entity = self.entity;
        if entity.field(name).is_none() {
            return Err(ValidateError::UnknownField {
                entity: entity.name.clone(),
                field: name.to_string(),
            });
        }

        let mut parts = Vec::new();
        let mut scalar = Map::new();
        match value {
            Json::Object(map) => {
                for (key, raw) in map {
                    if let Some(function) = AggregateFn::from_key(key) {
                        function.check_field(entity, name)?;
                        parts.extend(self.aggregate(function, name, raw)?);
                    } else {
                        scalar.insert(key.clone(), raw.clone());
                    }
                }
                if !scalar.is_empty() {
                    self.key_filter(name, Json::Object(scalar), &mut parts)?;
                }
            }
            _ => self.key_filter(name, value.clone(), &mut parts)?,
        }

        Ok(parts)
    }

    fn key_filter(&self, name: &str, body: Json, parts: &mut Vec<Having>) -> Result<(), ValidateError> {
        if !self.by.iter().any(|b| b == name) {
            return Err(ValidateError::FieldNotInGroupBy {
                entity: self.entity.name.clone(),
                field: name.to_string(),
                clause: "having",
            });
        }

        let mut filter = Map::new();
        filter.insert(name.to_string(), body);
        let predicate = PredicateBuilder::new(self.schema).filter(self.entity, &Json::Object(filter))?;
        parts.push(Having::Key(predicate));

        Ok(())
    }

    fn aggregate(
        &self,
        function: AggregateFn,
        name: &str,
        raw: &Json,
    ) -> Result<Vec<Having>, ValidateError> {
        let field = self.entity.field(name);
        let ty = function.output_type(field);
        let label = format!("{function}.{name}");

        let ops: Vec<(CompareOp, &Json)> = match raw {
            Json::Object(map) => map
                .iter()
                .map(|(key, operand)| {
                    CompareOp::from_key(key)
                        .filter(|op| !op.is_text() && !op.is_list())
                        .map(|op| (op, operand))
                        .ok_or_else(|| ValidateError::UnknownField {
                            entity: self.entity.name.clone(),
                            field: format!("{label}.{key}"),
                        })
                })
                .collect::<Result<_, _>>()?,
            _ => vec![(CompareOp::Eq, raw)],
        };

        ops.into_iter()
            .map(|(op, operand)| {
                let value = if op.is_membership() {
                    Value::from_json_list(operand, &ty)
                } else {
                    Value::from_json(operand, &ty)
                }
                .map_err(|err| ValidateError::TypeMismatch {
                    entity: self.entity.name.clone(),
                    field: label.clone(),
                    expected: err.expected,
                    found: err.found,
                })?;

                Ok(Having::Aggregate(AggregateCondition {
                    function,
                    field: name.to_string(),
                    op,
                    value,
                }))
            })
            .collect()
    }
}

fn relation_order(entity: &EntityModel, target: &str) -> ValidateError {
    ValidateError::InvalidOrderBy {
        entity: entity.name.clone(),
        reason: format!("groupBy cannot order by relation '{target}'"),
    }
}

fn shape(entity: &EntityModel, path: &str, expected: &'static str) -> ValidateError {
    ValidateError::ExpectedShape {
        entity: entity.name.clone(),
        path: path.to_string(),
        expected,
    }
}

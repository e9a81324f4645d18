use crate::{
    db::{
        backend::{
            AggregateRow, BackendError, GroupRow,
            memory::{
                read::{Reader, compare_keys, window},
                store::{Row, cell},
            },
        },
        query::{
            aggregate::{AggregateFn, AggregateSelection, COUNT_ALL, GroupBySpec, Having},
            order::OrderTarget,
            predicate::{CompareOp, Predicate},
            scope::Scope,
        },
    },
    model::EntityModel,
    value::{TextMode, Value, canonical_cmp, strict_order_cmp, values_equal},
};
use rust_decimal::Decimal;
use std::{cmp::Ordering, collections::BTreeMap};

pub(super) fn count(reader: Reader<'_>, entity: &EntityModel, scope: &Scope) -> u64 {
    let rows = reader.scoped(entity, scope, reader.store.rows(&entity.name));

    len(rows.len())
}

/// Non-null counts per field; `_all` counts rows.
pub(super) fn count_fields(
    reader: Reader<'_>,
    entity: &EntityModel,
    scope: &Scope,
    fields: &[String],
) -> Vec<(String, u64)> {
    let rows = reader.scoped(entity, scope, reader.store.rows(&entity.name));

    fields
        .iter()
        .map(|field| {
            let n = if field == COUNT_ALL {
                rows.len()
            } else {
                rows.iter().filter(|row| !cell(row, field).is_null()).count()
            };
            (field.clone(), len(n))
        })
        .collect()
}

pub(super) fn aggregate(
    reader: Reader<'_>,
    entity: &EntityModel,
    scope: &Scope,
    selection: &AggregateSelection,
) -> Result<AggregateRow, BackendError> {
    let rows = reader.scoped(entity, scope, reader.store.rows(&entity.name));
    let mut out = AggregateRow::default();
    for (function, field) in selection.pairs() {
        out.insert(function, field, compute(function, field, &rows)?);
    }

    Ok(out)
}

//
// Grouping
//

struct Group<'r> {
    keys: Vec<Value>,
    rows: Vec<&'r Row>,
    computed: BTreeMap<(AggregateFn, String), Value>,
}

impl Group<'_> {
    fn value(&mut self, function: AggregateFn, field: &str) -> Result<Value, BackendError> {
        let slot = (function, field.to_string());
        if let Some(value) = self.computed.get(&slot) {
            return Ok(value.clone());
        }
        let value = compute(function, field, &self.rows)?;
        self.computed.insert(slot, value.clone());

        Ok(value)
    }
}

/// Partition filtered rows by the `by` values in first-seen order, then
/// apply `having`, ordering and pagination.
pub(super) fn group_by(
    reader: Reader<'_>,
    entity: &EntityModel,
    filter: &Predicate,
    spec: &GroupBySpec,
) -> Result<Vec<GroupRow>, BackendError> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for row in reader.store.rows(&entity.name) {
        if !reader.matches(entity, row, filter) {
            continue;
        }
        let keys: Vec<Value> = spec.by.iter().map(|field| cell(row, field)).collect();
        match groups.iter_mut().find(|g| same_keys(&g.keys, &keys)) {
            Some(group) => group.rows.push(row),
            None => groups.push(Group {
                keys,
                rows: vec![row],
                computed: BTreeMap::new(),
            }),
        }
    }

    let mut kept = Vec::with_capacity(groups.len());
    for mut group in groups {
        if having(reader, entity, spec, &mut group, &spec.having)? {
            kept.push(group);
        }
    }

    let mut keyed = Vec::with_capacity(kept.len());
    for mut group in kept {
        let mut key = Vec::with_capacity(spec.order.len() + group.keys.len());
        for term in &spec.order {
            key.push(match &term.target {
                OrderTarget::Field(field) => key_value(spec, &group.keys, field),
                OrderTarget::Aggregate { function, field } => group.value(*function, field)?,
                OrderTarget::Relation { .. } | OrderTarget::RelationCount(_) => Value::Null,
            });
        }
        key.extend(group.keys.iter().cloned());
        keyed.push((key, group));
    }
    keyed.sort_by(|(a, _), (b, _)| compare_keys(&spec.order, a, b));

    let page = window(
        keyed.into_iter().map(|(_, group)| group).collect(),
        spec.skip,
        spec.take,
    );

    page.into_iter()
        .map(|mut group| {
            let mut aggregates = AggregateRow::default();
            for (function, field) in spec.aggregates.pairs() {
                aggregates.insert(function, field, group.value(function, field)?);
            }

            Ok(GroupRow {
                keys: spec.by.iter().cloned().zip(group.keys).collect(),
                aggregates,
            })
        })
        .collect()
}

fn having(
    reader: Reader<'_>,
    entity: &EntityModel,
    spec: &GroupBySpec,
    group: &mut Group<'_>,
    condition: &Having,
) -> Result<bool, BackendError> {
    Ok(match condition {
        Having::True => true,
        Having::False => false,
        Having::And(parts) => {
            for part in parts {
                if !having(reader, entity, spec, group, part)? {
                    return Ok(false);
                }
            }
            true
        }
        Having::Or(parts) => {
            for part in parts {
                if having(reader, entity, spec, group, part)? {
                    return Ok(true);
                }
            }
            false
        }
        Having::Not(inner) => !having(reader, entity, spec, group, inner)?,
        Having::Key(predicate) => {
            let row: Row = spec.by.iter().cloned().zip(group.keys.iter().cloned()).collect();
            reader.matches(entity, &row, predicate)
        }
        Having::Aggregate(condition) => {
            let actual = group.value(condition.function, &condition.field)?;
            satisfies(&actual, condition.op, &condition.value)
        }
    })
}

// Null aggregate outputs never satisfy a condition.
fn satisfies(actual: &Value, op: CompareOp, operand: &Value) -> bool {
    if actual.is_null() {
        return false;
    }
    let eq = |other: &Value| values_equal(actual, other, TextMode::Default);

    match op {
        CompareOp::Eq => eq(operand),
        CompareOp::Ne => !eq(operand),
        CompareOp::In => operand.as_list().is_some_and(|items| items.iter().any(eq)),
        CompareOp::NotIn => operand.as_list().is_some_and(|items| !items.iter().any(eq)),
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            strict_order_cmp(actual, operand).is_some_and(|ord| match op {
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Lte => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        _ => false,
    }
}

fn same_keys(a: &[Value], b: &[Value]) -> bool {
    a.iter().zip(b).all(|(x, y)| canonical_cmp(x, y) == Ordering::Equal)
}

fn key_value(spec: &GroupBySpec, keys: &[Value], field: &str) -> Value {
    spec.by
        .iter()
        .position(|b| b == field)
        .and_then(|i| keys.get(i).cloned())
        .unwrap_or(Value::Null)
}

//
// Functions
//

/// One aggregate over `rows`. Without non-null inputs every function but
/// `_count` yields null.
fn compute(function: AggregateFn, field: &str, rows: &[&Row]) -> Result<Value, BackendError> {
    if function == AggregateFn::Count && field == COUNT_ALL {
        return Ok(Value::Int(int(rows.len())));
    }
    let values: Vec<Value> = rows
        .iter()
        .map(|row| cell(row, field))
        .filter(|v| !v.is_null())
        .collect();

    match function {
        AggregateFn::Count => Ok(Value::Int(int(values.len()))),
        AggregateFn::Min => Ok(values
            .into_iter()
            .min_by(canonical_cmp)
            .unwrap_or(Value::Null)),
        AggregateFn::Max => Ok(values
            .into_iter()
            .max_by(canonical_cmp)
            .unwrap_or(Value::Null)),
        AggregateFn::Sum => sum(field, &values),
        AggregateFn::Avg => average(field, &values),
    }
}

fn sum(field: &str, values: &[Value]) -> Result<Value, BackendError> {
    let Some(first) = values.first() else {
        return Ok(Value::Null);
    };
    let overflow = || BackendError::CheckViolation {
        constraint: None,
        detail: format!("_sum of '{field}' overflowed"),
    };

    match first {
        Value::Int(_) => values
            .iter()
            .try_fold(0i64, |acc, v| acc.checked_add(v.as_i64()?))
            .map(Value::Int)
            .ok_or_else(overflow),
        Value::Decimal(_) => values
            .iter()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v.as_decimal()?))
            .map(Value::Decimal)
            .ok_or_else(overflow),
        Value::Float(_) => Ok(Value::Float(
            values
                .iter()
                .filter_map(|v| match v {
                    Value::Float(f) => Some(*f),
                    _ => None,
                })
                .sum(),
        )),
        other => Err(BackendError::other(format!(
            "cannot sum {} values of '{field}'",
            other.kind_label()
        ))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn average(field: &str, values: &[Value]) -> Result<Value, BackendError> {
    let total = sum(field, values)?;
    let n = values.len();

    Ok(match total {
        Value::Int(total) => Value::Float(total as f64 / n as f64),
        Value::Float(total) => Value::Float(total / n as f64),
        Value::Decimal(total) => total
            .checked_div(Decimal::from(n))
            .map_or(Value::Null, Value::Decimal),
        _ => Value::Null,
    })
}

fn len(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

use crate::{
    db::{
        backend::{
            RawCell, RawRow,
            memory::store::{Row, Store, cell, key_matches, primary_key},
        },
        query::{
            order::{Direction, NullsOrder, OrderTarget, OrderTerm},
            predicate::{CompareOp, ComparePredicate, Predicate, Quantifier},
            scope::Scope,
            selection::Selection,
            unique::UniqueWhere,
        },
    },
    model::{EntityModel, RelationModel, Schema},
    value::{TextMode, Value, canonical_cmp, strict_order_cmp, values_equal},
};
use std::cmp::Ordering;

///
/// Reader
///
/// Read-only view over a store snapshot. Filters use SQL three-valued
/// logic: a comparison against null is unknown and never matches.
///

#[derive(Clone, Copy)]
pub(super) struct Reader<'a> {
    pub schema: &'a Schema,
    pub store: &'a Store,
}

impl<'a> Reader<'a> {
    pub const fn new(schema: &'a Schema, store: &'a Store) -> Self {
        Self { schema, store }
    }

    //
    // Filtering
    //

    pub fn matches(&self, entity: &EntityModel, row: &Row, predicate: &Predicate) -> bool {
        self.eval(entity, row, predicate) == Some(true)
    }

    fn eval(&self, entity: &EntityModel, row: &Row, predicate: &Predicate) -> Option<bool> {
        match predicate {
            Predicate::True => Some(true),
            Predicate::False => Some(false),
            Predicate::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match self.eval(entity, row, part) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match self.eval(entity, row, part) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Predicate::Not(inner) => self.eval(entity, row, inner).map(|v| !v),
            Predicate::IsNull { field } => Some(cell(row, field).is_null()),
            Predicate::IsNotNull { field } => Some(!cell(row, field).is_null()),
            Predicate::IsEmpty { field } => match row.get(field) {
                Some(Value::List(items)) => Some(items.is_empty()),
                _ => None,
            },
            Predicate::Compare(cmp) => compare(row.get(cmp.field.as_str())?, cmp),
            Predicate::Relation(rel) => {
                let relation = entity.relation(&rel.relation)?;
                let target = self.schema.entity(&relation.target)?;
                let related = self.related(entity, relation, row);
                let hit = |r: &&Row| self.matches(target, r, &rel.predicate);

                Some(match rel.quantifier {
                    Quantifier::Is | Quantifier::Some => related.iter().any(hit),
                    Quantifier::IsNot | Quantifier::None => !related.iter().any(hit),
                    Quantifier::Every => related.iter().all(hit),
                })
            }
        }
    }

    /// Rows reached from `row` through `relation`, in insertion order.
    pub fn related(&self, entity: &EntityModel, relation: &RelationModel, row: &Row) -> Vec<&'a Row> {
        let Some(join) = self.schema.join_keys(entity, relation) else {
            return Vec::new();
        };
        let mut key = Vec::with_capacity(join.local.len());
        for (local, remote) in join.local.iter().zip(&join.remote) {
            match row.get(local) {
                Some(value) if !value.is_null() => key.push((remote.clone(), value.clone())),
                _ => return Vec::new(),
            }
        }

        self.store
            .rows(&relation.target)
            .iter()
            .filter(|candidate| key_matches(candidate, &key))
            .collect()
    }

    pub fn find_unique(&self, entity: &EntityModel, target: &UniqueWhere) -> Option<&'a Row> {
        self.store
            .rows(&entity.name)
            .iter()
            .find(|row| key_matches(row, &target.key.values) && self.matches(entity, row, &target.filter))
    }

    //
    // Scopes
    //

    /// Apply filter, ordering, distinct, cursor and pagination.
    pub fn scoped(
        &self,
        entity: &EntityModel,
        scope: &Scope,
        rows: impl IntoIterator<Item = &'a Row>,
    ) -> Vec<&'a Row> {
        let filtered = rows
            .into_iter()
            .filter(|row| self.matches(entity, row, &scope.filter));
        let mut keyed = self.sorted(entity, &scope.order, filtered);

        if !scope.distinct.is_empty() {
            let mut seen: Vec<Vec<Value>> = Vec::new();
            keyed.retain(|(_, row)| {
                let values: Vec<Value> = scope.distinct.iter().map(|f| cell(row, f)).collect();
                let duplicate = seen.iter().any(|prior| {
                    prior
                        .iter()
                        .zip(&values)
                        .all(|(a, b)| values_equal(a, b, TextMode::Default))
                });
                if !duplicate {
                    seen.push(values);
                }

                !duplicate
            });
        }

        let backwards = scope.take.is_some_and(|take| take < 0);
        if let Some(cursor) = &scope.cursor {
            let Some(anchor) = self.store.find(&entity.name, &cursor.values) else {
                return Vec::new();
            };
            let anchor = self.sort_key(entity, &scope.order, anchor);
            keyed.retain(|(key, _)| {
                let ord = compare_keys(&scope.order, key, &anchor);
                if backwards {
                    ord != Ordering::Greater
                } else {
                    ord != Ordering::Less
                }
            });
        }

        let rows: Vec<&'a Row> = keyed.into_iter().map(|(_, row)| row).collect();
        window(rows, scope.skip, scope.take)
    }

    /// Sort rows by `order`, breaking ties on the primary key.
    pub fn sorted(
        &self,
        entity: &EntityModel,
        order: &[OrderTerm],
        rows: impl IntoIterator<Item = &'a Row>,
    ) -> Vec<(Vec<Value>, &'a Row)> {
        let mut keyed: Vec<(Vec<Value>, &'a Row)> = rows
            .into_iter()
            .map(|row| (self.sort_key(entity, order, row), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(order, a, b));

        keyed
    }

    // Order values followed by the primary key values.
    fn sort_key(&self, entity: &EntityModel, order: &[OrderTerm], row: &Row) -> Vec<Value> {
        let mut key: Vec<Value> = order
            .iter()
            .map(|term| self.order_value(entity, row, &term.target))
            .collect();
        key.extend(primary_key(entity, row).into_iter().map(|(_, v)| v));

        key
    }

    fn order_value(&self, entity: &EntityModel, row: &Row, target: &OrderTarget) -> Value {
        match target {
            OrderTarget::Field(field) => cell(row, field),
            OrderTarget::Relation { path, field } => self
                .follow(entity, row, path)
                .map_or(Value::Null, |related| cell(related, field)),
            OrderTarget::RelationCount(relation) => entity.relation(relation).map_or(Value::Null, |rel| {
                Value::Int(i64::try_from(self.related(entity, rel, row).len()).unwrap_or(i64::MAX))
            }),
            OrderTarget::Aggregate { .. } => Value::Null,
        }
    }

    // Walk a chain of to-one relations.
    fn follow(&self, entity: &EntityModel, row: &Row, path: &[String]) -> Option<&'a Row> {
        let (first, rest) = path.split_first()?;
        let relation = entity.relation(first)?;
        let target = self.schema.entity(&relation.target)?;
        let next = self.related(entity, relation, row).into_iter().next()?;

        if rest.is_empty() {
            Some(next)
        } else {
            self.follow(target, next, rest)
        }
    }

    //
    // Projection
    //

    pub fn project(&self, entity: &EntityModel, row: &Row, selection: &Selection) -> RawRow {
        let mut out = RawRow::new();

        for field in &selection.fields {
            out.insert(field.clone(), RawCell::Value(cell(row, field)));
        }

        for included in &selection.relations {
            let (Some(relation), Some(target)) = (
                entity.relation(&included.relation),
                self.schema.entity(&included.target),
            ) else {
                continue;
            };
            let related = self.related(entity, relation, row);

            let value = if included.to_many {
                RawCell::Many(
                    self.scoped(target, &included.scope, related)
                        .into_iter()
                        .map(|r| self.project(target, r, &included.selection))
                        .collect(),
                )
            } else {
                RawCell::One(
                    related
                        .first()
                        .map(|r| self.project(target, r, &included.selection)),
                )
            };
            out.insert(included.relation.clone(), value);
        }

        if !selection.counts.is_empty() {
            let mut counts = RawRow::new();
            for count in &selection.counts {
                let Some(relation) = entity.relation(&count.relation) else {
                    continue;
                };
                let Some(target) = self.schema.entity(&relation.target) else {
                    continue;
                };
                let n = self
                    .related(entity, relation, row)
                    .into_iter()
                    .filter(|r| self.matches(target, r, &count.filter))
                    .count();
                counts.insert(
                    count.relation.clone(),
                    RawCell::Value(Value::Int(i64::try_from(n).unwrap_or(i64::MAX))),
                );
            }
            out.insert("_count", RawCell::One(Some(counts)));
        }

        out
    }
}

/// Skip/take over sorted rows. A negative `take` counts from the end.
pub(super) fn window<T>(rows: Vec<T>, skip: Option<u64>, take: Option<i64>) -> Vec<T> {
    let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(usize::MAX);

    match take {
        Some(take) if take < 0 => {
            let count = usize::try_from(take.unsigned_abs()).unwrap_or(usize::MAX);
            let end = rows.len().saturating_sub(skip);
            let start = end.saturating_sub(count);

            rows.into_iter().skip(start).take(end - start).collect()
        }
        Some(take) => {
            let count = usize::try_from(take).unwrap_or(usize::MAX);
            rows.into_iter().skip(skip).take(count).collect()
        }
        None => rows.into_iter().skip(skip).collect(),
    }
}

/// Compare two sort keys: ordered terms first, then ascending primary key.
pub(super) fn compare_keys(order: &[OrderTerm], left: &[Value], right: &[Value]) -> Ordering {
    for (i, (a, b)) in left.iter().zip(right).enumerate() {
        let ord = match order.get(i) {
            Some(term) => compare_term(term.direction, term.nulls, a, b),
            None => canonical_cmp(a, b),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// Nulls sort last ascending and first descending unless stated.
pub(super) fn compare_term(
    direction: Direction,
    nulls: Option<NullsOrder>,
    left: &Value,
    right: &Value,
) -> Ordering {
    let nulls_first = nulls.map_or(direction == Direction::Desc, |n| n == NullsOrder::First);

    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) if nulls_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if nulls_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = canonical_cmp(left, right);
            match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
    }
}

/// Three-valued comparison of a stored value against a predicate operand.
fn compare(actual: &Value, cmp: &ComparePredicate) -> Option<bool> {
    if actual.is_null() {
        return None;
    }
    let mode = cmp.mode;
    let operand = &cmp.value;

    let result = match cmp.op {
        CompareOp::Eq => values_equal(actual, operand, mode),
        CompareOp::Ne => !values_equal(actual, operand, mode),
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            let ord = ordered(actual, operand, mode)?;
            match cmp.op {
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Lte => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }
        }
        CompareOp::In => operand
            .as_list()?
            .iter()
            .any(|item| values_equal(actual, item, mode)),
        CompareOp::NotIn => !operand
            .as_list()?
            .iter()
            .any(|item| values_equal(actual, item, mode)),
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let (text, needle) = (actual.as_text()?, operand.as_text()?);
            let (text, needle) = match mode {
                TextMode::Insensitive => (text.to_lowercase(), needle.to_lowercase()),
                TextMode::Default => (text.to_string(), needle.to_string()),
            };
            match cmp.op {
                CompareOp::Contains => text.contains(&needle),
                CompareOp::StartsWith => text.starts_with(&needle),
                _ => text.ends_with(&needle),
            }
        }
        CompareOp::Has => actual
            .as_list()?
            .iter()
            .any(|item| values_equal(item, operand, mode)),
        CompareOp::HasEvery => {
            let items = actual.as_list()?;
            operand
                .as_list()?
                .iter()
                .all(|wanted| items.iter().any(|item| values_equal(item, wanted, mode)))
        }
        CompareOp::HasSome => {
            let items = actual.as_list()?;
            operand
                .as_list()?
                .iter()
                .any(|wanted| items.iter().any(|item| values_equal(item, wanted, mode)))
        }
    };

    Some(result)
}

fn ordered(actual: &Value, operand: &Value, mode: TextMode) -> Option<Ordering> {
    match (actual, operand, mode) {
        (Value::Text(a), Value::Text(b), TextMode::Insensitive) => {
            Some(a.to_lowercase().cmp(&b.to_lowercase()))
        }
        _ => strict_order_cmp(actual, operand),
    }
}

use crate::{
    db::query::{
        ValidateError, operand,
        predicate::{CompareOp, ComparePredicate, Predicate, Quantifier, RelationPredicate},
    },
    model::{EntityModel, FieldModel, RelationModel, ScalarType, Schema},
    value::{TextMode, Value},
};
use serde_json::{Map, Value as Json};

/// Maximum nesting of filter objects, combinators and relation hops.
pub const MAX_PREDICATE_DEPTH: usize = 64;

/// Maximum number of operands in one `in` / `notIn` list.
pub const MAX_IN_LIST: usize = 10_000;

/// Build a predicate for `entity` from a filter document.
///
/// Empty combinators are no-ops: `AND: []` and `NOT: []` match every row,
/// `OR: []` matches none.
pub fn build_predicate(schema: &Schema, entity: &str, raw: &Json) -> Result<Predicate, ValidateError> {
    let model = schema
        .entity(entity)
        .ok_or_else(|| ValidateError::UnknownEntity(entity.to_string()))?;

    PredicateBuilder::new(schema).filter(model, raw)
}

///
/// PredicateBuilder
///

pub(crate) struct PredicateBuilder<'a> {
    schema: &'a Schema,
}

impl<'a> PredicateBuilder<'a> {
    pub(crate) const fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub(crate) fn filter(&self, entity: &EntityModel, raw: &Json) -> Result<Predicate, ValidateError> {
        self.object(entity, raw, "where", 1)
    }

    fn object(
        &self,
        entity: &EntityModel,
        raw: &Json,
        path: &str,
        depth: usize,
    ) -> Result<Predicate, ValidateError> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(ValidateError::PredicateTooDeep {
                max: MAX_PREDICATE_DEPTH,
            });
        }
        let Json::Object(map) = raw else {
            return Err(shape(entity, path, "a filter object"));
        };

        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            let part = match key.as_str() {
                "AND" => self.and(entity, value, depth)?,
                "OR" => self.or(entity, value, depth)?,
                "NOT" => self.not(entity, value, depth)?,
                _ => {
                    if let Some(field) = entity.field(key) {
                        self.field(entity, field, value, depth)?
                    } else if let Some(relation) = entity.relation(key) {
                        self.relation(entity, relation, value, depth)?
                    } else {
                        return Err(ValidateError::UnknownField {
                            entity: entity.name.clone(),
                            field: key.clone(),
                        });
                    }
                }
            };
            parts.push(part);
        }

        Ok(match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        })
    }

    //
    // Combinators
    //

    fn children(
        &self,
        entity: &EntityModel,
        items: &[Json],
        key: &str,
        depth: usize,
    ) -> Result<Vec<Predicate>, ValidateError> {
        items
            .iter()
            .map(|item| self.object(entity, item, key, depth + 1))
            .collect()
    }

    fn and(&self, entity: &EntityModel, value: &Json, depth: usize) -> Result<Predicate, ValidateError> {
        match value {
            Json::Array(items) if items.is_empty() => Ok(Predicate::True),
            Json::Array(items) => Ok(Predicate::And(self.children(entity, items, "AND", depth)?)),
            Json::Object(_) => self.object(entity, value, "AND", depth + 1),
            _ => Err(shape(entity, "AND", "an object or a list of objects")),
        }
    }

    fn or(&self, entity: &EntityModel, value: &Json, depth: usize) -> Result<Predicate, ValidateError> {
        match value {
            Json::Array(items) if items.is_empty() => Ok(Predicate::False),
            Json::Array(items) => Ok(Predicate::Or(self.children(entity, items, "OR", depth)?)),
            Json::Object(_) => self.object(entity, value, "OR", depth + 1),
            _ => Err(shape(entity, "OR", "an object or a list of objects")),
        }
    }

    fn not(&self, entity: &EntityModel, value: &Json, depth: usize) -> Result<Predicate, ValidateError> {
        match value {
            Json::Array(items) => {
                let mut negated: Vec<Predicate> = self
                    .children(entity, items, "NOT", depth)?
                    .into_iter()
                    .map(|p| Predicate::Not(Box::new(p)))
                    .collect();

                Ok(match negated.len() {
                    0 => Predicate::True,
                    1 => negated.remove(0),
                    _ => Predicate::And(negated),
                })
            }
            Json::Object(_) => Ok(Predicate::Not(Box::new(
                self.object(entity, value, "NOT", depth + 1)?,
            ))),
            _ => Err(shape(entity, "NOT", "an object or a list of objects")),
        }
    }

    //
    // Scalar fields
    //

    fn field(
        &self,
        entity: &EntityModel,
        field: &FieldModel,
        value: &Json,
        depth: usize,
    ) -> Result<Predicate, ValidateError> {
        match value {
            Json::Object(ops) if is_operator_object(field, ops) => {
                self.operators(entity, field, ops, depth + 1)
            }
            Json::Null => null_check(entity, field, false),
            _ => {
                let operand = operand::field_value(self.schema, entity, field, value)?;

                Ok(compare(field, CompareOp::Eq, operand, TextMode::Default))
            }
        }
    }

    fn operators(
        &self,
        entity: &EntityModel,
        field: &FieldModel,
        ops: &Map<String, Json>,
        depth: usize,
    ) -> Result<Predicate, ValidateError> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(ValidateError::PredicateTooDeep {
                max: MAX_PREDICATE_DEPTH,
            });
        }

        let mode = match ops.get("mode") {
            None => TextMode::Default,
            Some(raw) => {
                if field.ty != ScalarType::Text || field.list {
                    return Err(operand::mismatch(
                        entity,
                        field,
                        "a Text field for 'mode'",
                        field.type_label(),
                    ));
                }
                match raw.as_str() {
                    Some("insensitive") => TextMode::Insensitive,
                    Some("default") => TextMode::Default,
                    _ => {
                        return Err(shape(
                            entity,
                            &format!("{}.mode", field.name),
                            "\"default\" or \"insensitive\"",
                        ));
                    }
                }
            }
        };

        let mut parts = Vec::with_capacity(ops.len());
        for (key, raw) in ops {
            let part = match (key.as_str(), raw) {
                ("mode", _) => continue,
                ("equals", Json::Null) => null_check(entity, field, false)?,
                ("not", Json::Null) => null_check(entity, field, true)?,
                ("not", Json::Object(inner)) if field.ty != ScalarType::Json => {
                    Predicate::Not(Box::new(self.operators(entity, field, inner, depth + 1)?))
                }
                ("isEmpty", _) => {
                    if !field.list {
                        return Err(unsupported(entity, field, "isEmpty"));
                    }
                    match raw.as_bool() {
                        Some(true) => Predicate::IsEmpty {
                            field: field.name.clone(),
                        },
                        Some(false) => Predicate::Not(Box::new(Predicate::IsEmpty {
                            field: field.name.clone(),
                        })),
                        None => return Err(operand::mismatch(entity, field, "boolean", "non-boolean")),
                    }
                }
                (other, _) => {
                    let Some(op) = CompareOp::from_key(other) else {
                        return Err(ValidateError::UnknownField {
                            entity: entity.name.clone(),
                            field: format!("{}.{other}", field.name),
                        });
                    };
                    let operand = self.operand(entity, field, op, raw)?;

                    compare(field, op, operand, mode)
                }
            };
            parts.push(part);
        }

        Ok(match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        })
    }

    fn operand(
        &self,
        entity: &EntityModel,
        field: &FieldModel,
        op: CompareOp,
        raw: &Json,
    ) -> Result<Value, ValidateError> {
        let applicable = match op {
            CompareOp::Eq | CompareOp::Ne => true,
            CompareOp::In | CompareOp::NotIn => !field.list && field.ty != ScalarType::Json,
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
                !field.list && field.ty.is_orderable()
            }
            CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
                !field.list && field.ty.is_text()
            }
            CompareOp::Has | CompareOp::HasEvery | CompareOp::HasSome => field.list,
        };
        if !applicable {
            return Err(unsupported(entity, field, op.key()));
        }

        match op {
            CompareOp::Eq | CompareOp::Ne if field.list => {
                operand::list(self.schema, entity, field, raw)
            }
            CompareOp::In | CompareOp::NotIn | CompareOp::HasEvery | CompareOp::HasSome => {
                if let Some(items) = raw.as_array()
                    && items.len() > MAX_IN_LIST
                {
                    return Err(ValidateError::InListTooLarge {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        len: items.len(),
                        max: MAX_IN_LIST,
                    });
                }

                operand::list(self.schema, entity, field, raw)
            }
            _ => operand::scalar(self.schema, entity, field, raw),
        }
    }

    //
    // Relations
    //

    fn relation(
        &self,
        entity: &EntityModel,
        relation: &RelationModel,
        value: &Json,
        depth: usize,
    ) -> Result<Predicate, ValidateError> {
        let target = self
            .schema
            .entity(&relation.target)
            .ok_or_else(|| ValidateError::UnknownEntity(relation.target.clone()))?;

        if relation.is_to_many() {
            let Json::Object(map) = value else {
                return Err(shape(entity, &relation.name, "an object with some, every or none"));
            };
            if map.is_empty() {
                return Err(shape(entity, &relation.name, "an object with some, every or none"));
            }

            let mut parts = Vec::with_capacity(map.len());
            for (key, inner) in map {
                let quantifier = match key.as_str() {
                    "some" => Quantifier::Some,
                    "every" => Quantifier::Every,
                    "none" => Quantifier::None,
                    _ => {
                        return Err(shape(
                            entity,
                            &format!("{}.{key}", relation.name),
                            "one of some, every or none",
                        ));
                    }
                };
                let nested = self.object(target, inner, &relation.name, depth + 1)?;
                parts.push(quantified(relation, quantifier, nested));
            }

            return Ok(match parts.len() {
                1 => parts.remove(0),
                _ => Predicate::And(parts),
            });
        }

        match value {
            Json::Null => Ok(absent(relation)),
            Json::Object(map) if !map.is_empty() && map.keys().all(|k| k == "is" || k == "isNot") => {
                let mut parts = Vec::with_capacity(map.len());
                for (key, inner) in map {
                    let part = match (key.as_str(), inner) {
                        ("is", Json::Null) => absent(relation),
                        ("isNot", Json::Null) => quantified(relation, Quantifier::Is, Predicate::True),
                        ("is", _) => quantified(
                            relation,
                            Quantifier::Is,
                            self.object(target, inner, &relation.name, depth + 1)?,
                        ),
                        _ => quantified(
                            relation,
                            Quantifier::IsNot,
                            self.object(target, inner, &relation.name, depth + 1)?,
                        ),
                    };
                    parts.push(part);
                }

                Ok(match parts.len() {
                    1 => parts.remove(0),
                    _ => Predicate::And(parts),
                })
            }
            Json::Object(map) if map.contains_key("is") || map.contains_key("isNot") => Err(shape(
                entity,
                &relation.name,
                "either is/isNot or a nested filter, not both",
            )),
            Json::Object(_) => Ok(quantified(
                relation,
                Quantifier::Is,
                self.object(target, value, &relation.name, depth + 1)?,
            )),
            _ => Err(shape(entity, &relation.name, "a filter object or null")),
        }
    }
}

// Json fields take a bare document unless the object is made only of
// `equals` / `not` keys.
fn is_operator_object(field: &FieldModel, ops: &Map<String, Json>) -> bool {
    if field.ty == ScalarType::Json {
        return !ops.is_empty() && ops.keys().all(|k| k == "equals" || k == "not");
    }

    true
}

fn null_check(entity: &EntityModel, field: &FieldModel, negated: bool) -> Result<Predicate, ValidateError> {
    if !field.nullable {
        return Err(operand::mismatch(entity, field, field.type_label(), "null"));
    }
    let name = field.name.clone();

    Ok(if negated {
        Predicate::IsNotNull { field: name }
    } else {
        Predicate::IsNull { field: name }
    })
}

fn compare(field: &FieldModel, op: CompareOp, value: Value, mode: TextMode) -> Predicate {
    Predicate::Compare(ComparePredicate {
        field: field.name.clone(),
        op,
        value,
        mode,
    })
}

fn quantified(relation: &RelationModel, quantifier: Quantifier, predicate: Predicate) -> Predicate {
    Predicate::Relation(RelationPredicate {
        relation: relation.name.clone(),
        quantifier,
        predicate: Box::new(predicate),
    })
}

fn absent(relation: &RelationModel) -> Predicate {
    quantified(relation, Quantifier::IsNot, Predicate::True)
}

fn unsupported(entity: &EntityModel, field: &FieldModel, operator: &str) -> ValidateError {
    operand::mismatch(
        entity,
        field,
        format!("a field supporting '{operator}'"),
        field.type_label(),
    )
}

fn shape(entity: &EntityModel, path: &str, expected: &'static str) -> ValidateError {
    ValidateError::ExpectedShape {
        entity: entity.name.clone(),
        path: path.to_string(),
        expected,
    }
}

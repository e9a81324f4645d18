use crate::{
    db::query::{
        ValidateError,
        context::PlanContext,
        predicate::{Predicate, PredicateBuilder},
        scope::{CursorOrder, Scope, ScopeInputs, build_scope},
        selection::{RelationCount, RelationSelection, Selection},
    },
    model::{EntityModel, RelationModel},
};
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;

// Arguments accepted on an included relation.
const RELATION_ARGS: [&str; 9] = [
    "where", "orderBy", "cursor", "take", "skip", "distinct", "select", "include", "omit",
];

// The subset that only makes sense for to-many relations.
const TO_MANY_ARGS: [&str; 6] = ["where", "orderBy", "cursor", "take", "skip", "distinct"];

///
/// SelectionArgs
///

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SelectionArgs<'a> {
    pub select: Option<&'a Json>,
    pub include: Option<&'a Json>,
    pub omit: Option<&'a Json>,
}

/// Resolve `select` / `include` / `omit` against one entity.
///
/// The global omit policy is applied first; a hidden field comes back only
/// through `omit: { field: false }` on a client that allows overrides.
pub(crate) fn build_selection(
    ctx: PlanContext<'_>,
    entity: &EntityModel,
    args: SelectionArgs<'_>,
) -> Result<Selection, ValidateError> {
    let select = args.select.filter(|raw| !raw.is_null());
    let include = args.include.filter(|raw| !raw.is_null());
    let omit = parse_omit(entity, args.omit.filter(|raw| !raw.is_null()))?;

    if select.is_some() && include.is_some() {
        return Err(ValidateError::SelectAndInclude {
            entity: entity.name.clone(),
        });
    }
    if select.is_some() && omit.iter().any(|(_, hide)| *hide) {
        return Err(ValidateError::SelectAndOmit {
            entity: entity.name.clone(),
        });
    }

    let overrides = overrides(ctx, entity, &omit)?;
    let visible = |name: &str| {
        !ctx.config.omit.is_omitted(&entity.name, name) || overrides.contains(name)
    };

    let mut selection = Selection {
        entity: entity.name.clone(),
        ..Selection::default()
    };

    if let Some(raw) = select {
        for (key, value) in object(entity, raw, "select")? {
            if key == "_count" {
                selection.counts = counts(ctx, entity, value)?;
            } else if entity.field(key).is_some() {
                match value.as_bool() {
                    Some(true) if !visible(key) => {
                        return Err(ValidateError::OmittedField {
                            entity: entity.name.clone(),
                            field: key.clone(),
                        });
                    }
                    Some(true) => selection.fields.push(key.clone()),
                    Some(false) => {}
                    None => return Err(shape(entity, &format!("select.{key}"), "a boolean")),
                }
            } else if let Some(relation) = entity.relation(key) {
                selection.relations.extend(relation_selection(ctx, entity, relation, value)?);
            } else {
                return Err(unknown(entity, key));
            }
        }
        selection
            .fields
            .sort_by_key(|name| entity.fields.iter().position(|f| &f.name == name));
    } else {
        let hidden: BTreeSet<&str> = omit
            .iter()
            .filter(|(_, hide)| *hide)
            .map(|(name, _)| name.as_str())
            .collect();
        selection.fields = entity
            .scalar_names()
            .filter(|name| visible(name) && !hidden.contains(name))
            .map(str::to_string)
            .collect();

        if let Some(raw) = include {
            for (key, value) in object(entity, raw, "include")? {
                if key == "_count" {
                    selection.counts = counts(ctx, entity, value)?;
                } else if entity.field(key).is_some() {
                    return Err(ValidateError::IncludeScalar {
                        entity: entity.name.clone(),
                        field: key.clone(),
                    });
                } else if let Some(relation) = entity.relation(key) {
                    selection.relations.extend(relation_selection(ctx, entity, relation, value)?);
                } else {
                    return Err(unknown(entity, key));
                }
            }
        }
    }

    if selection.is_empty() {
        return Err(ValidateError::EmptySelection {
            entity: entity.name.clone(),
        });
    }

    Ok(selection)
}

fn parse_omit(entity: &EntityModel, raw: Option<&Json>) -> Result<Vec<(String, bool)>, ValidateError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    object(entity, raw, "omit")?
        .iter()
        .map(|(key, value)| {
            if entity.field(key).is_none() {
                return Err(unknown(entity, key));
            }
            value
                .as_bool()
                .map(|hide| (key.clone(), hide))
                .ok_or_else(|| shape(entity, &format!("omit.{key}"), "a boolean"))
        })
        .collect()
}

// Globally hidden fields re-included with `omit: { field: false }`.
fn overrides(
    ctx: PlanContext<'_>,
    entity: &EntityModel,
    omit: &[(String, bool)],
) -> Result<BTreeSet<String>, ValidateError> {
    let mut fields = BTreeSet::new();

    for (field, hide) in omit {
        if *hide || !ctx.config.omit.is_omitted(&entity.name, field) {
            continue;
        }
        if !ctx.config.allow_omit_override {
            return Err(ValidateError::OmitOverrideDisabled {
                entity: entity.name.clone(),
                field: field.clone(),
            });
        }

        tracing::info!(
            target: "quarry::audit",
            entity = %entity.name,
            field = %field,
            "omit policy overridden"
        );
        fields.insert(field.clone());
    }

    Ok(fields)
}

fn relation_selection(
    ctx: PlanContext<'_>,
    entity: &EntityModel,
    relation: &RelationModel,
    raw: &Json,
) -> Result<Option<RelationSelection>, ValidateError> {
    let target = ctx
        .schema
        .entity(&relation.target)
        .ok_or_else(|| ValidateError::UnknownEntity(relation.target.clone()))?;

    let (scope, selection) = match raw {
        Json::Bool(false) => return Ok(None),
        Json::Bool(true) => (
            Scope::default(),
            build_selection(ctx, target, SelectionArgs::default())?,
        ),
        Json::Object(args) => {
            for key in args.keys() {
                if !RELATION_ARGS.contains(&key.as_str()) {
                    return Err(unknown(entity, &format!("{}.{key}", relation.name)));
                }
                if !relation.is_to_many() && TO_MANY_ARGS.contains(&key.as_str()) {
                    return Err(ValidateError::RelationArgumentsOnToOne {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        argument: key.clone(),
                    });
                }
            }

            let path = |key: &str| format!("{}.{key}", relation.name);
            let take = int_arg(entity, args, "take", &path("take"))?;
            let skip = int_arg(entity, args, "skip", &path("skip"))?
                .map(|skip| {
                    u64::try_from(skip)
                        .map_err(|_| shape(entity, &path("skip"), "a non-negative integer"))
                })
                .transpose()?;

            let scope = build_scope(
                ctx.schema,
                target,
                ScopeInputs {
                    filter: args.get("where"),
                    order_by: args.get("orderBy"),
                    cursor: args.get("cursor"),
                    take,
                    skip,
                    distinct: args.get("distinct"),
                },
                CursorOrder::PrimaryKey,
            )?;
            let selection = build_selection(
                ctx,
                target,
                SelectionArgs {
                    select: args.get("select"),
                    include: args.get("include"),
                    omit: args.get("omit"),
                },
            )?;

            (scope, selection)
        }
        _ => {
            return Err(shape(
                entity,
                &relation.name,
                "true, false or an object of relation arguments",
            ));
        }
    };

    Ok(Some(RelationSelection {
        relation: relation.name.clone(),
        target: target.name.clone(),
        to_many: relation.is_to_many(),
        scope,
        selection,
    }))
}

fn counts(
    ctx: PlanContext<'_>,
    entity: &EntityModel,
    raw: &Json,
) -> Result<Vec<RelationCount>, ValidateError> {
    let all = || -> Vec<RelationCount> {
        entity
            .relations
            .iter()
            .filter(|r| r.is_to_many())
            .map(|r| RelationCount {
                relation: r.name.clone(),
                filter: Predicate::True,
            })
            .collect()
    };

    let map = match raw {
        Json::Bool(true) => return Ok(all()),
        Json::Bool(false) => return Ok(Vec::new()),
        Json::Object(map) => map,
        _ => return Err(shape(entity, "_count", "true or { select }")),
    };
    if map.keys().any(|k| k != "select") {
        return Err(shape(entity, "_count", "true or { select }"));
    }
    let Some(select) = map.get("select") else {
        return Ok(all());
    };

    let mut counts = Vec::new();
    for (key, value) in object(entity, select, "_count.select")? {
        let relation = entity.relation(key).ok_or_else(|| unknown(entity, key))?;
        if !relation.is_to_many() {
            return Err(shape(
                entity,
                &format!("_count.select.{key}"),
                "a to-many relation",
            ));
        }

        let filter = match value {
            Json::Bool(false) => continue,
            Json::Bool(true) => Predicate::True,
            Json::Object(args) if args.keys().all(|k| k == "where") => {
                let target = ctx
                    .schema
                    .entity(&relation.target)
                    .ok_or_else(|| ValidateError::UnknownEntity(relation.target.clone()))?;
                match args.get("where") {
                    Some(filter) => PredicateBuilder::new(ctx.schema).filter(target, filter)?,
                    None => Predicate::True,
                }
            }
            _ => {
                return Err(shape(
                    entity,
                    &format!("_count.select.{key}"),
                    "true or { where }",
                ));
            }
        };

        counts.push(RelationCount {
            relation: key.clone(),
            filter,
        });
    }

    Ok(counts)
}

fn int_arg(
    entity: &EntityModel,
    args: &Map<String, Json>,
    key: &str,
    path: &str,
) -> Result<Option<i64>, ValidateError> {
    match args.get(key) {
        None | Some(Json::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| shape(entity, path, "an integer")),
    }
}

fn object<'j>(
    entity: &EntityModel,
    raw: &'j Json,
    path: &str,
) -> Result<&'j Map<String, Json>, ValidateError> {
    raw.as_object().ok_or_else(|| shape(entity, path, "an object"))
}

fn shape(entity: &EntityModel, path: &str, expected: &'static str) -> ValidateError {
    ValidateError::ExpectedShape {
        entity: entity.name.clone(),
        path: path.to_string(),
        expected,
    }
}

fn unknown(entity: &EntityModel, key: &str) -> ValidateError {
    ValidateError::UnknownField {
        entity: entity.name.clone(),
        field: key.to_string(),
    }
}

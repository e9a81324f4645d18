use crate::{db::query::predicate::Predicate, value::TextMode};
use serde_json::{Map, Value as Json, json};

/// Serialize a predicate back into a filter document.
///
/// The output is canonical: every composite renders as an explicit
/// `AND` / `OR` / `NOT` key and every comparison as an operator object, so
/// re-building the document yields the same tree.
#[must_use]
pub fn render_filter(predicate: &Predicate) -> Json {
    match predicate {
        Predicate::True => json!({}),
        Predicate::False => json!({ "OR": [] }),
        Predicate::And(parts) => json!({ "AND": parts.iter().map(render_filter).collect::<Vec<_>>() }),
        Predicate::Or(parts) => json!({ "OR": parts.iter().map(render_filter).collect::<Vec<_>>() }),
        Predicate::Not(inner) => json!({ "NOT": render_filter(inner) }),
        Predicate::Compare(cmp) => {
            let mut ops = Map::new();
            ops.insert(cmp.op.key().to_string(), cmp.value.to_json());
            if cmp.mode == TextMode::Insensitive {
                ops.insert("mode".to_string(), json!("insensitive"));
            }

            field(&cmp.field, Json::Object(ops))
        }
        Predicate::IsNull { field: name } => field(name, json!({ "equals": null })),
        Predicate::IsNotNull { field: name } => field(name, json!({ "not": null })),
        Predicate::IsEmpty { field: name } => field(name, json!({ "isEmpty": true })),
        Predicate::Relation(rel) => {
            let mut inner = Map::new();
            inner.insert(
                rel.quantifier.key().to_string(),
                render_filter(&rel.predicate),
            );

            field(&rel.relation, Json::Object(inner))
        }
    }
}

fn field(name: &str, body: Json) -> Json {
    let mut map = Map::new();
    map.insert(name.to_string(), body);

    Json::Object(map)
}

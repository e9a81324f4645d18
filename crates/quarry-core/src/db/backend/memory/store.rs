use crate::{
    model::EntityModel,
    value::{TextMode, Value, values_equal},
};
use std::collections::BTreeMap;

/// One stored row, keyed by scalar field name.
pub(super) type Row = BTreeMap<String, Value>;

/// Field/value pairs identifying a row, usually the primary key.
pub(super) type Key = Vec<(String, Value)>;

///
/// Table
///
/// Rows in insertion order plus per-field autoincrement counters.
///

#[derive(Clone, Debug, Default)]
pub(super) struct Table {
    pub rows: Vec<Row>,
    pub sequences: BTreeMap<String, i64>,
}

impl Table {
    pub fn position(&self, key: &[(String, Value)]) -> Option<usize> {
        self.rows.iter().position(|row| key_matches(row, key))
    }

    pub fn next_sequence(&mut self, field: &str) -> i64 {
        let next = self.sequences.get(field).copied().unwrap_or(0).saturating_add(1);
        self.sequences.insert(field.to_string(), next);

        next
    }

    pub fn observe_sequence(&mut self, field: &str, value: i64) {
        let current = self.sequences.entry(field.to_string()).or_insert(0);
        *current = (*current).max(value);
    }
}

///
/// Store
///

#[derive(Clone, Debug, Default)]
pub(super) struct Store {
    tables: BTreeMap<String, Table>,
}

impl Store {
    pub fn rows(&self, entity: &str) -> &[Row] {
        self.tables.get(entity).map_or(&[], |table| table.rows.as_slice())
    }

    pub fn table_mut(&mut self, entity: &str) -> &mut Table {
        self.tables.entry(entity.to_string()).or_default()
    }

    pub fn find(&self, entity: &str, key: &[(String, Value)]) -> Option<&Row> {
        self.rows(entity).iter().find(|row| key_matches(row, key))
    }

    pub fn len(&self, entity: &str) -> usize {
        self.rows(entity).len()
    }
}

/// Every key field is present, non-null and equal.
pub(super) fn key_matches(row: &Row, key: &[(String, Value)]) -> bool {
    key.iter().all(|(field, expected)| {
        row.get(field)
            .is_some_and(|actual| !actual.is_null() && values_equal(actual, expected, TextMode::Default))
    })
}

/// Values of `fields` on `row`, `None` when any of them is null.
pub(super) fn key_of(row: &Row, fields: &[String]) -> Option<Key> {
    fields
        .iter()
        .map(|field| match row.get(field) {
            Some(value) if !value.is_null() => Some((field.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

pub(super) fn primary_key(entity: &EntityModel, row: &Row) -> Key {
    entity
        .primary_key
        .iter()
        .map(|field| (field.clone(), row.get(field).cloned().unwrap_or(Value::Null)))
        .collect()
}

pub(super) fn cell(row: &Row, field: &str) -> Value {
    row.get(field).cloned().unwrap_or(Value::Null)
}

use crate::{
    db::{
        backend::{
            BackendError,
            memory::{
                read::Reader,
                store::{Key, Row, Store, cell, key_matches, key_of, primary_key},
            },
        },
        query::{
            unique::UniqueWhere,
            write::{CreateData, FieldUpdate, RelationOp, RelationWrite, UpdateData},
        },
    },
    model::{DefaultValue, EntityModel, ReferentialAction, RelationLink, RelationModel, Schema},
    value::Value,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

///
/// Writer
///
/// Applies writes to a draft store. Callers discard the draft on error, so
/// a failed plan leaves no partial effects.
///

pub(super) struct Writer<'a> {
    schema: &'a Schema,
    store: &'a mut Store,
    now: DateTime<Utc>,
}

impl<'a> Writer<'a> {
    pub fn new(schema: &'a Schema, store: &'a mut Store) -> Self {
        Self {
            schema,
            store,
            now: Utc::now(),
        }
    }

    pub fn reader(&self) -> Reader<'_> {
        Reader::new(self.schema, &*self.store)
    }

    //
    // Create
    //

    /// Insert one row with its nested relation writes; returns its key.
    pub fn create(&mut self, entity: &'a EntityModel, data: &CreateData) -> Result<Key, BackendError> {
        let mut row = Row::new();
        for (field, value) in &data.values {
            row.insert(field.clone(), value.clone());
        }

        let mut inverse = Vec::new();
        for write in &data.relations {
            let relation = self.relation(entity, &write.relation)?;
            if relation.is_owning() {
                self.write_owned(entity, relation, write, &mut row)?;
            } else {
                inverse.push((relation, write));
            }
        }

        self.fill_defaults(entity, &mut row);
        self.check_row(entity, &row, None)?;

        let key = primary_key(entity, &row);
        self.store.table_mut(&entity.name).rows.push(row);

        for (relation, write) in inverse {
            self.write_inverse(entity, &key, relation, write)?;
        }

        Ok(key)
    }

    fn fill_defaults(&mut self, entity: &EntityModel, row: &mut Row) {
        let table = self.store.table_mut(&entity.name);

        for field in &entity.fields {
            if let Some(value) = row.get(&field.name) {
                if let (Some(DefaultValue::AutoIncrement), Value::Int(explicit)) = (&field.default, value) {
                    table.observe_sequence(&field.name, *explicit);
                }
                continue;
            }

            let value = match &field.default {
                Some(DefaultValue::Static(value)) => value.clone(),
                Some(DefaultValue::AutoIncrement) => Value::Int(table.next_sequence(&field.name)),
                Some(DefaultValue::Now) => Value::DateTime(self.now),
                Some(DefaultValue::Uuid) => Value::Text(uuid::Uuid::new_v4().to_string()),
                None if field.updated_at => Value::DateTime(self.now),
                None if field.list => Value::List(Vec::new()),
                None => Value::Null,
            };
            row.insert(field.name.clone(), value);
        }
    }

    //
    // Update
    //

    pub fn update(
        &mut self,
        entity: &'a EntityModel,
        target: &UniqueWhere,
        data: &UpdateData,
    ) -> Result<Key, BackendError> {
        let key = self
            .reader()
            .find_unique(entity, target)
            .map(|row| primary_key(entity, row))
            .ok_or_else(|| not_found(entity, "no row matches the update target"))?;

        self.update_row(entity, &key, data)
    }

    /// Apply `data` to the row identified by `key`; returns the new key.
    pub fn update_row(
        &mut self,
        entity: &'a EntityModel,
        key: &Key,
        data: &UpdateData,
    ) -> Result<Key, BackendError> {
        let before = self
            .store
            .find(&entity.name, key)
            .cloned()
            .ok_or_else(|| not_found(entity, "row vanished during update"))?;
        let mut row = before.clone();

        for (field, update) in &data.values {
            let next = apply(&cell(&row, field), update)?;
            row.insert(field.clone(), next);
        }
        for field in entity.fields.iter().filter(|f| f.updated_at) {
            if !data.values.iter().any(|(name, _)| name == &field.name) {
                row.insert(field.name.clone(), Value::DateTime(self.now));
            }
        }

        let mut inverse = Vec::new();
        for write in &data.relations {
            let relation = self.relation(entity, &write.relation)?;
            if relation.is_owning() {
                self.write_owned(entity, relation, write, &mut row)?;
            } else {
                inverse.push((relation, write));
            }
        }

        let index = self
            .store
            .table_mut(&entity.name)
            .position(key)
            .ok_or_else(|| not_found(entity, "row vanished during update"))?;
        self.check_row(entity, &row, Some(index))?;
        self.check_referenced_keys(entity, &before, &row)?;

        let new_key = primary_key(entity, &row);
        self.store.table_mut(&entity.name).rows[index] = row;

        for (relation, write) in inverse {
            self.write_inverse(entity, &new_key, relation, write)?;
        }

        Ok(new_key)
    }

    // Rows elsewhere must not be left pointing at key values that changed.
    fn check_referenced_keys(&self, entity: &EntityModel, before: &Row, after: &Row) -> Result<(), BackendError> {
        for (owner, relation) in self.schema.back_references(&entity.name) {
            let Some((fields, references)) = relation.owned_keys() else {
                continue;
            };
            let changed = references.iter().any(|r| cell(before, r) != cell(after, r));
            let Some(old) = key_of(before, references) else {
                continue;
            };
            if !changed {
                continue;
            }

            let lookup: Key = fields
                .iter()
                .zip(old)
                .map(|(field, (_, value))| (field.clone(), value))
                .collect();
            if self.store.rows(&owner.name).iter().any(|r| key_matches(r, &lookup)) {
                return Err(BackendError::ForeignKeyViolation {
                    constraint: Some(relation.name.clone()),
                    fields: references.to_vec(),
                    detail: Some(format!("'{}' rows still reference the old key", owner.name)),
                });
            }
        }

        Ok(())
    }

    //
    // Delete
    //

    /// Delete one row, applying referential actions to rows that point at it.
    pub fn delete_row(&mut self, entity: &'a EntityModel, key: &Key) -> Result<(), BackendError> {
        if self.store.find(&entity.name, key).is_none() {
            return Err(not_found(entity, "no row matches the delete target"));
        }

        // Cascade closure first, then referential checks, then mutation.
        let mut doomed: Vec<(&'a EntityModel, Key)> = vec![(entity, key.clone())];
        let mut next = 0;
        while next < doomed.len() {
            let (target, target_key) = doomed[next].clone();
            next += 1;

            for (owner, relation, _, dependents) in self.dependents(target, &target_key) {
                if relation.delete_action() != Some(ReferentialAction::Cascade) {
                    continue;
                }
                for dependent in dependents {
                    if !is_doomed(&doomed, owner, &dependent) {
                        doomed.push((owner, dependent));
                    }
                }
            }
        }

        let mut nulled: Vec<(&'a EntityModel, Key, &'a [String])> = Vec::new();
        for (target, target_key) in &doomed {
            for (owner, relation, fields, dependents) in self.dependents(*target, target_key) {
                let survivors: Vec<Key> = dependents
                    .into_iter()
                    .filter(|dependent| !is_doomed(&doomed, owner, dependent))
                    .collect();
                if survivors.is_empty() {
                    continue;
                }

                match relation.delete_action() {
                    Some(ReferentialAction::Cascade) => {}
                    Some(ReferentialAction::SetNull)
                        if fields
                            .iter()
                            .all(|f| owner.field(f).is_some_and(|m| m.nullable)) =>
                    {
                        nulled.extend(survivors.into_iter().map(|k| (owner, k, fields)));
                    }
                    _ => {
                        return Err(BackendError::ForeignKeyViolation {
                            constraint: Some(relation.name.clone()),
                            fields: fields.to_vec(),
                            detail: Some(format!(
                                "{} '{}' row(s) still reference this '{}'",
                                survivors.len(),
                                owner.name,
                                target.name
                            )),
                        });
                    }
                }
            }
        }

        for (owner, dependent, fields) in nulled {
            let table = self.store.table_mut(&owner.name);
            if let Some(index) = table.position(&dependent) {
                for field in fields {
                    table.rows[index].insert(field.clone(), Value::Null);
                }
            }
        }

        for (target, target_key) in doomed {
            let table = self.store.table_mut(&target.name);
            if let Some(index) = table.position(&target_key) {
                table.rows.remove(index);
            }
        }

        Ok(())
    }

    /// Rows referencing `entity`/`key`, grouped by owning relation.
    #[allow(clippy::type_complexity)]
    fn dependents(
        &self,
        entity: &'a EntityModel,
        key: &Key,
    ) -> Vec<(&'a EntityModel, &'a RelationModel, &'a [String], Vec<Key>)> {
        let Some(row) = self.store.find(&entity.name, key) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for (owner, relation) in self.schema.back_references(&entity.name) {
            let Some((fields, refs)) = relation.owned_keys() else {
                continue;
            };
            let Some(values) = key_of(row, refs) else {
                continue;
            };
            let lookup: Key = fields
                .iter()
                .zip(values)
                .map(|(field, (_, value))| (field.clone(), value))
                .collect();

            let keys: Vec<Key> = self
                .store
                .rows(&owner.name)
                .iter()
                .filter(|r| key_matches(r, &lookup))
                .map(|r| primary_key(owner, r))
                .filter(|k| owner.name != entity.name || k != key)
                .collect();
            if !keys.is_empty() {
                found.push((owner, relation, fields, keys));
            }
        }

        found
    }

    //
    // Relations
    //

    // Connect/create/disconnect on the side holding the foreign key.
    fn write_owned(
        &mut self,
        entity: &EntityModel,
        relation: &'a RelationModel,
        write: &RelationWrite,
        row: &mut Row,
    ) -> Result<(), BackendError> {
        let Some((fields, references)) = relation.owned_keys() else {
            return Ok(());
        };
        let target = self.entity(&relation.target)?;

        for op in &write.ops {
            let linked = match op {
                RelationOp::Connect(where_) => self
                    .reader()
                    .find_unique(target, where_)
                    .cloned()
                    .ok_or_else(|| connect_missing(entity, relation))?,
                RelationOp::Create(nested) => {
                    let key = self.create(target, nested)?;
                    self.store
                        .find(&target.name, &key)
                        .cloned()
                        .ok_or_else(|| not_found(target, "nested create produced no row"))?
                }
                RelationOp::Disconnect(_) => {
                    for field in fields {
                        row.insert(field.clone(), Value::Null);
                    }
                    continue;
                }
            };

            for (field, reference) in fields.iter().zip(references) {
                row.insert(field.clone(), cell(&linked, reference));
            }
        }

        Ok(())
    }

    // Connect/create/disconnect rows on the other side that point at `key`.
    fn write_inverse(
        &mut self,
        entity: &'a EntityModel,
        key: &Key,
        relation: &'a RelationModel,
        write: &RelationWrite,
    ) -> Result<(), BackendError> {
        let RelationLink::Inverse { relation: inverse } = &relation.link else {
            return Ok(());
        };
        let target = self.entity(&relation.target)?;
        let (fields, references) = target
            .relation(inverse)
            .and_then(RelationModel::owned_keys)
            .ok_or_else(|| BackendError::other(format!("relation '{}' has no owner", relation.name)))?;

        let parent = self
            .store
            .find(&entity.name, key)
            .cloned()
            .ok_or_else(|| not_found(entity, "parent row vanished"))?;
        let link: Key = fields
            .iter()
            .zip(references)
            .map(|(field, reference)| (field.clone(), cell(&parent, reference)))
            .collect();

        for op in &write.ops {
            match op {
                RelationOp::Connect(where_) => {
                    let child = self
                        .reader()
                        .find_unique(target, where_)
                        .map(|row| primary_key(target, row))
                        .ok_or_else(|| connect_missing(entity, relation))?;
                    self.set_link(target, &child, &link)?;
                }
                RelationOp::Create(nested) => {
                    let mut nested = nested.clone();
                    nested.values.retain(|(f, _)| !fields.contains(f));
                    nested.values.extend(link.iter().cloned());
                    self.create(target, &nested)?;
                }
                RelationOp::Disconnect(where_) => {
                    let linked: Vec<Key> = self
                        .store
                        .rows(&target.name)
                        .iter()
                        .filter(|row| key_matches(row, &link))
                        .filter(|row| {
                            where_.as_ref().is_none_or(|w| {
                                key_matches(row, &w.key.values)
                                    && self.reader().matches(target, row, &w.filter)
                            })
                        })
                        .map(|row| primary_key(target, row))
                        .collect();
                    let cleared: Key = fields.iter().map(|f| (f.clone(), Value::Null)).collect();
                    for child in &linked {
                        self.set_link(target, child, &cleared)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn set_link(&mut self, entity: &EntityModel, key: &Key, values: &Key) -> Result<(), BackendError> {
        let table = self.store.table_mut(&entity.name);
        let index = table
            .position(key)
            .ok_or_else(|| not_found(entity, "linked row vanished"))?;
        let mut row = table.rows[index].clone();
        for (field, value) in values {
            row.insert(field.clone(), value.clone());
        }

        self.check_row(entity, &row, Some(index))?;
        self.store.table_mut(&entity.name).rows[index] = row;

        Ok(())
    }

    //
    // Constraints
    //

    /// Not-null, unique and foreign key checks for a row about to be stored
    /// at `index` (or appended).
    fn check_row(&self, entity: &EntityModel, row: &Row, index: Option<usize>) -> Result<(), BackendError> {
        for field in &entity.fields {
            if !field.nullable && cell(row, &field.name).is_null() {
                return Err(BackendError::CheckViolation {
                    constraint: None,
                    detail: format!("'{}.{}' cannot be null", entity.name, field.name),
                });
            }
        }

        let rows = self.store.rows(&entity.name);
        for set in entity.unique_sets() {
            let Some(key) = key_of(row, &set.fields) else {
                continue;
            };
            let clash = rows
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != index && key_matches(other, &key));
            if clash {
                return Err(BackendError::UniqueViolation {
                    constraint: Some(set.name.clone()),
                    fields: set.fields.clone(),
                });
            }
        }

        for relation in &entity.relations {
            let Some((fields, references)) = relation.owned_keys() else {
                continue;
            };
            let Some(values) = key_of(row, fields) else {
                continue;
            };
            let lookup: Key = references
                .iter()
                .zip(values)
                .map(|(reference, (_, value))| (reference.clone(), value))
                .collect();
            // A self-referencing row may point at itself.
            let self_ref = relation.target == entity.name && key_matches(row, &lookup);
            if !self_ref && self.store.find(&relation.target, &lookup).is_none() {
                return Err(BackendError::ForeignKeyViolation {
                    constraint: Some(relation.name.clone()),
                    fields: fields.to_vec(),
                    detail: None,
                });
            }
        }

        Ok(())
    }

    fn entity(&self, name: &str) -> Result<&'a EntityModel, BackendError> {
        self.schema
            .entity(name)
            .ok_or_else(|| BackendError::other(format!("unknown entity '{name}'")))
    }

    fn relation(&self, entity: &'a EntityModel, name: &str) -> Result<&'a RelationModel, BackendError> {
        entity.relation(name).ok_or_else(|| {
            BackendError::other(format!("unknown relation '{}.{name}'", entity.name))
        })
    }
}

/// Apply one field update to the stored value. Arithmetic on null stays null.
fn apply(current: &Value, update: &FieldUpdate) -> Result<Value, BackendError> {
    let (op, operand): (fn(Numeric, Numeric) -> Option<Numeric>, &Value) = match update {
        FieldUpdate::Set(value) => return Ok(value.clone()),
        FieldUpdate::Push(value) => {
            let mut items = match current {
                Value::List(items) => items.clone(),
                _ => Vec::new(),
            };
            match value {
                Value::List(more) => items.extend(more.iter().cloned()),
                other => items.push(other.clone()),
            }

            return Ok(Value::List(items));
        }
        FieldUpdate::Increment(v) => (Numeric::checked_add, v),
        FieldUpdate::Decrement(v) => (Numeric::checked_sub, v),
        FieldUpdate::Multiply(v) => (Numeric::checked_mul, v),
        FieldUpdate::Divide(v) => (Numeric::checked_div, v),
    };

    if current.is_null() {
        return Ok(Value::Null);
    }
    let (Some(left), Some(right)) = (Numeric::from_value(current), Numeric::from_value(operand)) else {
        return Err(BackendError::other(format!(
            "cannot apply {} to {}",
            update.key(),
            current.kind_label()
        )));
    };

    op(left, right)
        .map(Numeric::into_value)
        .ok_or_else(|| BackendError::CheckViolation {
            constraint: None,
            detail: format!("{} overflowed or divided by zero", update.key()),
        })
}

///
/// Numeric
///
/// Arithmetic over same-kind numbers. Operands are typed against the field
/// before they reach the backend.
///

#[derive(Clone, Copy, Debug)]
enum Numeric {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
}

impl Numeric {
    const fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(Self::Int(*v)),
            Value::Float(v) => Some(Self::Float(*v)),
            Value::Decimal(v) => Some(Self::Decimal(*v)),
            _ => None,
        }
    }

    const fn into_value(self) -> Value {
        match self {
            Self::Int(v) => Value::Int(v),
            Self::Float(v) => Value::Float(v),
            Self::Decimal(v) => Value::Decimal(v),
        }
    }

    fn checked_add(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.checked_add(b).map(Self::Int),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a + b)),
            (Self::Decimal(a), Self::Decimal(b)) => a.checked_add(b).map(Self::Decimal),
            _ => None,
        }
    }

    fn checked_sub(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.checked_sub(b).map(Self::Int),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a - b)),
            (Self::Decimal(a), Self::Decimal(b)) => a.checked_sub(b).map(Self::Decimal),
            _ => None,
        }
    }

    fn checked_mul(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.checked_mul(b).map(Self::Int),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a * b)),
            (Self::Decimal(a), Self::Decimal(b)) => a.checked_mul(b).map(Self::Decimal),
            _ => None,
        }
    }

    fn checked_div(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.checked_div(b).map(Self::Int),
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a / b)),
            (Self::Decimal(a), Self::Decimal(b)) => a.checked_div(b).map(Self::Decimal),
            _ => None,
        }
    }
}

fn is_doomed(doomed: &[(&EntityModel, Key)], entity: &EntityModel, key: &Key) -> bool {
    doomed
        .iter()
        .any(|(target, target_key)| target.name == entity.name && target_key == key)
}

fn not_found(entity: &EntityModel, detail: &str) -> BackendError {
    BackendError::RecordNotFound {
        entity: entity.name.clone(),
        detail: detail.to_string(),
    }
}

fn connect_missing(entity: &EntityModel, relation: &RelationModel) -> BackendError {
    BackendError::RecordNotFound {
        entity: relation.target.clone(),
        detail: format!(
            "no '{}' row to connect through '{}.{}'",
            relation.target, entity.name, relation.name
        ),
    }
}

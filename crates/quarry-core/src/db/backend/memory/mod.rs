//! In-memory reference backend.
//!
//! Executes plans against a row store guarded by one lock. Writes run on a
//! draft copy that replaces the live store only when the whole plan
//! succeeds, so every plan is atomic. There is no SQL; raw statements are
//! rejected.

mod aggregate;
mod read;
mod store;
mod write;


use crate::{
    db::{
        backend::{Backend, BackendError, ExecutionContext, RawResult, RawRow},
        query::{Operation, QueryPlan, order::OrderTerm, predicate::Predicate},
    },
    model::{EntityModel, Schema},
    value::Value,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use read::Reader;
use std::sync::Arc;
use store::{Key, Store, primary_key};
use write::Writer;

///
/// MemoryBackend
///

pub struct MemoryBackend {
    schema: Arc<Schema>,
    store: RwLock<Store>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            store: RwLock::new(Store::default()),
        }
    }

    /// Number of stored rows of `entity`.
    #[must_use]
    pub fn len(&self, entity: &str) -> usize {
        self.store.read().len(entity)
    }

    #[must_use]
    pub fn is_empty(&self, entity: &str) -> bool {
        self.len(entity) == 0
    }

    fn entity(&self, name: &str) -> Result<&EntityModel, BackendError> {
        self.schema
            .entity(name)
            .ok_or_else(|| BackendError::other(format!("unknown entity '{name}'")))
    }

    fn read(&self, store: &Store, entity: &EntityModel, operation: &Operation) -> Result<RawResult, BackendError> {
        let reader = Reader::new(&self.schema, store);
        let all = store.rows(&entity.name);

        Ok(match operation {
            Operation::FindUnique { target, selection } => RawResult::Row(
                reader
                    .find_unique(entity, target)
                    .map(|row| reader.project(entity, row, selection)),
            ),
            Operation::FindFirst(read) => RawResult::Row(
                reader
                    .scoped(entity, &read.scope, all)
                    .first()
                    .map(|row| reader.project(entity, row, &read.selection)),
            ),
            Operation::FindMany(read) => RawResult::Rows(
                reader
                    .scoped(entity, &read.scope, all)
                    .into_iter()
                    .map(|row| reader.project(entity, row, &read.selection))
                    .collect(),
            ),
            Operation::Count { scope, fields: None } => {
                RawResult::Count(aggregate::count(reader, entity, scope))
            }
            Operation::Count {
                scope,
                fields: Some(fields),
            } => RawResult::CountFields(aggregate::count_fields(reader, entity, scope, fields)),
            Operation::Aggregate { scope, aggregates } => {
                RawResult::Aggregate(aggregate::aggregate(reader, entity, scope, aggregates)?)
            }
            Operation::GroupBy { filter, spec } => {
                RawResult::Groups(aggregate::group_by(reader, entity, filter, spec)?)
            }
            other => {
                return Err(BackendError::other(format!(
                    "'{}' is not a read operation",
                    other.kind()
                )));
            }
        })
    }

    fn write(&self, draft: &mut Store, entity: &EntityModel, operation: &Operation) -> Result<RawResult, BackendError> {
        let project = |store: &Store, key: &Key, selection| {
            let reader = Reader::new(&self.schema, store);
            store
                .find(&entity.name, key)
                .map(|row| reader.project(entity, row, selection))
        };

        Ok(match operation {
            Operation::Create { data, selection } => {
                let key = Writer::new(&self.schema, draft).create(entity, data)?;
                RawResult::Row(project(&*draft, &key, selection))
            }
            Operation::CreateMany {
                rows,
                skip_duplicates,
            } => {
                let mut created = 0;
                for data in rows {
                    match Writer::new(&self.schema, draft).create(entity, data) {
                        Ok(_) => created += 1,
                        Err(BackendError::UniqueViolation { .. }) if *skip_duplicates => {}
                        Err(err) => return Err(err),
                    }
                }
                RawResult::Affected(created)
            }
            Operation::Update {
                target,
                data,
                selection,
            } => {
                let key = Writer::new(&self.schema, draft).update(entity, target, data)?;
                RawResult::Row(project(&*draft, &key, selection))
            }
            Operation::UpdateMany {
                filter,
                data,
                limit,
                order,
            } => {
                let keys = self.targets(draft, entity, filter, order, *limit);
                let mut writer = Writer::new(&self.schema, draft);
                for key in &keys {
                    writer.update_row(entity, key, data)?;
                }
                RawResult::Affected(count(keys.len()))
            }
            Operation::Upsert {
                target,
                create,
                update,
                selection,
            } => {
                let existing = Reader::new(&self.schema, &*draft)
                    .find_unique(entity, target)
                    .map(|row| primary_key(entity, row));
                let mut writer = Writer::new(&self.schema, draft);
                let key = match existing {
                    Some(key) => writer.update_row(entity, &key, update)?,
                    None => writer.create(entity, create)?,
                };
                RawResult::Row(project(&*draft, &key, selection))
            }
            Operation::Delete { target, selection } => {
                let reader = Reader::new(&self.schema, &*draft);
                let Some(row) = reader.find_unique(entity, target) else {
                    return Err(BackendError::RecordNotFound {
                        entity: entity.name.clone(),
                        detail: "no row matches the delete target".to_string(),
                    });
                };
                let key = primary_key(entity, row);
                let before = reader.project(entity, row, selection);

                Writer::new(&self.schema, draft).delete_row(entity, &key)?;
                RawResult::Row(Some(before))
            }
            Operation::DeleteMany {
                filter,
                limit,
                order,
            } => {
                let keys = self.targets(draft, entity, filter, order, *limit);
                let mut deleted = 0;
                for key in &keys {
                    // An earlier cascade may already have removed it.
                    if draft.find(&entity.name, key).is_none() {
                        continue;
                    }
                    Writer::new(&self.schema, draft).delete_row(entity, key)?;
                    deleted += 1;
                }
                RawResult::Affected(deleted)
            }
            other => {
                return Err(BackendError::other(format!(
                    "'{}' is not a write operation",
                    other.kind()
                )));
            }
        })
    }

    // Bulk targets: insertion order unless an order is given, then the limit.
    fn targets(
        &self,
        store: &Store,
        entity: &EntityModel,
        filter: &Predicate,
        order: &[OrderTerm],
        limit: Option<u64>,
    ) -> Vec<Key> {
        let reader = Reader::new(&self.schema, store);
        let matching = store
            .rows(&entity.name)
            .iter()
            .filter(|row| reader.matches(entity, row, filter));
        let rows: Vec<_> = if order.is_empty() {
            matching.collect()
        } else {
            reader
                .sorted(entity, order, matching)
                .into_iter()
                .map(|(_, row)| row)
                .collect()
        };
        let limit = limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        rows.into_iter()
            .take(limit)
            .map(|row| primary_key(entity, row))
            .collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn execute(&self, ctx: &ExecutionContext, plan: &QueryPlan) -> Result<RawResult, BackendError> {
        let entity = self.entity(&plan.entity)?;

        if plan.is_write() {
            let mut store = self.store.write();
            let mut draft = store.clone();
            let result = self.write(&mut draft, entity, &plan.operation)?;
            *store = draft;
            tracing::trace!(id = ctx.id, entity = %plan.entity, "memory write committed");

            Ok(result)
        } else {
            let store = self.store.read();
            self.read(&store, entity, &plan.operation)
        }
    }

    async fn execute_raw(&self, _: &ExecutionContext, _: &str, _: &[Value]) -> Result<u64, BackendError> {
        Err(BackendError::Unsupported("raw statements".to_string()))
    }

    async fn query_raw(&self, _: &ExecutionContext, _: &str, _: &[Value]) -> Result<Vec<RawRow>, BackendError> {
        Err(BackendError::Unsupported("raw queries".to_string()))
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

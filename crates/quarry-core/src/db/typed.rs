use crate::{
    db::{
        delegate::Delegate,
        query::args::{CreateArgs, DeleteArgs, FindManyArgs, FindUniqueArgs, IntoArgs, UpdateArgs, UpsertArgs},
        response::Record,
    },
    error::Error,
};
use derive_more::Deref;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

///
/// EntityKind
///
/// Binds a row type to an entity in the schema. Records are decoded into
/// the type by field name, so the type's serde names must match the
/// entity's field names.
///

pub trait EntityKind: DeserializeOwned {
    const ENTITY: &'static str;
}

///
/// TypedDelegate
///
/// A `Delegate` whose row-returning operations decode into `E`. Every
/// untyped operation stays reachable through `Deref`.
///

#[derive(Deref)]
pub struct TypedDelegate<'c, E: EntityKind> {
    #[deref]
    delegate: Delegate<'c>,
    _marker: PhantomData<fn() -> E>,
}

impl<'c, E: EntityKind> TypedDelegate<'c, E> {
    pub(crate) const fn new(delegate: Delegate<'c>) -> Self {
        Self {
            delegate,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn untyped(&self) -> &Delegate<'c> {
        &self.delegate
    }

    pub async fn find_unique(&self, args: impl IntoArgs<FindUniqueArgs>) -> Result<Option<E>, Error> {
        self.delegate.find_unique(args).await?.as_ref().map(decode).transpose()
    }

    pub async fn find_first(&self, args: impl IntoArgs<FindManyArgs>) -> Result<Option<E>, Error> {
        self.delegate.find_first(args).await?.as_ref().map(decode).transpose()
    }

    pub async fn find_many(&self, args: impl IntoArgs<FindManyArgs>) -> Result<Vec<E>, Error> {
        self.delegate.find_many(args).await?.iter().map(decode).collect()
    }

    pub async fn create(&self, args: impl IntoArgs<CreateArgs>) -> Result<E, Error> {
        decode(&self.delegate.create(args).await?)
    }

    pub async fn update(&self, args: impl IntoArgs<UpdateArgs>) -> Result<E, Error> {
        decode(&self.delegate.update(args).await?)
    }

    pub async fn upsert(&self, args: impl IntoArgs<UpsertArgs>) -> Result<E, Error> {
        decode(&self.delegate.upsert(args).await?)
    }

    pub async fn delete(&self, args: impl IntoArgs<DeleteArgs>) -> Result<E, Error> {
        decode(&self.delegate.delete(args).await?)
    }
}

fn decode<E: DeserializeOwned>(record: &Record) -> Result<E, Error> {
    record.decode().map_err(Error::from)
}

//! Plan dispatch.
//!
//! Validated plans travel to the backend through an ordered interceptor
//! chain fixed at client construction. Backend failures are mapped into the
//! public error taxonomy here and nowhere else.


use crate::{
    config::TransactionOptions,
    db::{
        backend::{Backend, BackendError, ExecutionContext, RawResult, RawRow},
        query::{OperationKind, QueryPlan},
    },
    error::{BackendFailure, ConstraintKind, ConstraintViolation, Error, NotFoundError},
    value::Value,
};
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

///
/// Interceptor
///
/// Wraps plan execution. Implementations may inspect or log the plan,
/// short-circuit with their own result, or post-process the backend's
/// answer. Call `next.run` to continue the chain.
///

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(
        &self,
        ctx: &ExecutionContext,
        plan: &QueryPlan,
        next: Next<'_>,
    ) -> Result<RawResult, BackendError>;
}

///
/// Next
///
/// The remainder of an interceptor chain, ending at the backend.
///

pub struct Next<'a> {
    backend: &'a dyn Backend,
    chain: &'a [Arc<dyn Interceptor>],
}

impl Next<'_> {
    pub async fn run(self, ctx: &ExecutionContext, plan: &QueryPlan) -> Result<RawResult, BackendError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    backend: self.backend,
                    chain: rest,
                };
                head.intercept(ctx, plan, next).await
            }
            None => self.backend.execute(ctx, plan).await,
        }
    }
}

///
/// Dispatcher
///

pub(crate) struct Dispatcher {
    backend: Arc<dyn Backend>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    transaction: TransactionOptions,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(
        backend: Arc<dyn Backend>,
        interceptors: Vec<Arc<dyn Interceptor>>,
        transaction: TransactionOptions,
    ) -> Self {
        Self {
            backend,
            interceptors,
            transaction,
            next_id: AtomicU64::new(1),
        }
    }

    fn context(&self, entity: Option<&str>, operation: OperationKind) -> ExecutionContext {
        ExecutionContext {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            entity: entity.map(str::to_string),
            operation,
            transaction: self.transaction,
        }
    }

    pub(crate) async fn dispatch(&self, plan: &QueryPlan) -> Result<RawResult, Error> {
        let ctx = self.context(Some(&plan.entity), plan.kind());
        tracing::debug!(
            id = ctx.id,
            entity = %plan.entity,
            operation = %ctx.operation,
            interceptors = self.interceptors.len(),
            "dispatched"
        );

        let next = Next {
            backend: self.backend.as_ref(),
            chain: &self.interceptors,
        };

        next.run(&ctx, plan)
            .await
            .map_err(|err| self.fail(&ctx, err))
    }

    /// Raw statements bypass the interceptor chain: there is no plan to hand it.
    pub(crate) async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let ctx = self.context(None, OperationKind::ExecuteRaw);
        tracing::debug!(id = ctx.id, params = params.len(), "dispatched raw statement");

        self.backend
            .execute_raw(&ctx, sql, params)
            .await
            .map_err(|err| self.fail(&ctx, err))
    }

    pub(crate) async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<RawRow>, Error> {
        let ctx = self.context(None, OperationKind::QueryRaw);
        tracing::debug!(id = ctx.id, params = params.len(), "dispatched raw query");

        self.backend
            .query_raw(&ctx, sql, params)
            .await
            .map_err(|err| self.fail(&ctx, err))
    }

    fn fail(&self, ctx: &ExecutionContext, err: BackendError) -> Error {
        tracing::warn!(
            id = ctx.id,
            entity = ctx.entity.as_deref().unwrap_or("-"),
            operation = %ctx.operation,
            error = %err,
            "backend call failed"
        );

        map_backend_error(ctx.entity.as_deref(), ctx.operation, err)
    }
}

/// Map a backend failure into the public taxonomy.
pub(crate) fn map_backend_error(entity: Option<&str>, operation: OperationKind, err: BackendError) -> Error {
    let entity_name = || entity.unwrap_or_default().to_string();

    match err {
        BackendError::UniqueViolation { constraint, fields } => ConstraintViolation {
            entity: entity_name(),
            kind: ConstraintKind::Unique,
            constraint,
            fields,
            detail: None,
        }
        .into(),
        BackendError::ForeignKeyViolation {
            constraint,
            fields,
            detail,
        } => ConstraintViolation {
            entity: entity_name(),
            kind: ConstraintKind::ForeignKey,
            constraint,
            fields,
            detail,
        }
        .into(),
        BackendError::CheckViolation { constraint, detail } => ConstraintViolation {
            entity: entity_name(),
            kind: ConstraintKind::Check,
            constraint,
            fields: Vec::new(),
            detail: Some(detail),
        }
        .into(),
        BackendError::RecordNotFound { entity, detail } => {
            NotFoundError::new(entity, operation.as_str())
                .with_detail(detail)
                .into()
        }
        BackendError::Other { message, source } => BackendFailure {
            entity: entity.map(str::to_string),
            message,
            source,
        }
        .into(),
        err @ BackendError::Unsupported(_) => BackendFailure {
            entity: entity.map(str::to_string),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
        .into(),
    }
}

//! Middleware and the onion they form.
//!
//! Every entry receives the [`Context`] and a [`Next`] continuation. Code
//! before `next.run(ctx).await` runs on the way in, code after it on the way
//! out:
//!
//! ```
//! use onion_web::{Context, MiddlewareResult, Next};
//!
//! async fn timing(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
//!     let start = std::time::Instant::now();
//!     next.run(ctx).await?;
//!     tracing::info!(path = ctx.path(), elapsed = ?start.elapsed(), "handled");
//!     Ok(())
//! }
//! ```
//!
//! `Next` is consumed by `run`, so a middleware can call it at most once. Not
//! calling it at all short-circuits everything registered after it.

mod compose;
mod fn_trait;
mod legacy;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::context::Context;
use crate::error::{BoxError, InvalidMiddlewareError};

pub use compose::{Composed, compose};
pub use fn_trait::{FnMiddleware, MiddlewareFn, middleware_fn};
pub use legacy::{Adapted, Flow, Interceptor, Legacy, adapt, legacy};

pub type MiddlewareResult = Result<(), BoxError>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> MiddlewareResult;

    /// Used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The rest of the chain after the running middleware.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    tail: Option<Box<Next<'a>>>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self { rest: chain, tail: None }
    }

    /// Runs `chain`, then continues with `tail` once it is exhausted.
    pub(crate) fn nested(chain: &'a [Arc<dyn Middleware>], tail: Next<'a>) -> Self {
        Self { rest: chain, tail: Some(Box::new(tail)) }
    }

    /// Runs the remaining middleware, resolving once all of them returned.
    pub async fn run(mut self, ctx: &mut Context) -> MiddlewareResult {
        loop {
            if let Some((head, rest)) = self.rest.split_first() {
                return head.call(ctx, Next { rest, tail: self.tail }).await;
            }
            match self.tail {
                Some(tail) => self = *tail,
                None => return Ok(()),
            }
        }
    }

    /// Middleware left before the end of the chain, nested chains included.
    pub fn remaining(&self) -> usize {
        self.rest.len() + self.tail.as_ref().map_or(0, |tail| tail.remaining())
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("remaining", &self.remaining()).finish()
    }
}

/// What `register` accepts.
///
/// Implemented for every [`Middleware`], for [`Legacy`] interceptors, which
/// are adapted here and only here, and for `Option`, where `None` is
/// rejected with [`InvalidMiddlewareError`].
pub trait IntoMiddleware {
    fn into_middleware(self) -> Result<Arc<dyn Middleware>, InvalidMiddlewareError>;
}

impl<M: Middleware + 'static> IntoMiddleware for M {
    fn into_middleware(self) -> Result<Arc<dyn Middleware>, InvalidMiddlewareError> {
        Ok(Arc::new(self))
    }
}

impl<I: Interceptor + 'static> IntoMiddleware for Legacy<I> {
    fn into_middleware(self) -> Result<Arc<dyn Middleware>, InvalidMiddlewareError> {
        let adapted = adapt(self.into_inner());
        warn!(name = adapted.name(), "interceptors are deprecated, write a middleware taking `Next` instead");
        Ok(Arc::new(adapted))
    }
}

impl<M: IntoMiddleware> IntoMiddleware for Option<M> {
    fn into_middleware(self) -> Result<Arc<dyn Middleware>, InvalidMiddlewareError> {
        self.ok_or(InvalidMiddlewareError)?.into_middleware()
    }
}

//! Before/after interceptors, the older way of hooking into a request.
//!
//! They are still accepted by `register` when wrapped with [`legacy`], and
//! converted once, at registration, into a regular middleware.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::BoxError;
use crate::middleware::{Middleware, MiddlewareResult, Next};

/// Whether the rest of the chain runs after [`Interceptor::on_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn on_request(&self, _ctx: &mut Context) -> Result<Flow, BoxError> {
        Ok(Flow::Continue)
    }

    async fn on_response(&self, _ctx: &mut Context) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Marks an interceptor for registration.
#[derive(Debug)]
pub struct Legacy<I>(I);

pub fn legacy<I: Interceptor>(interceptor: I) -> Legacy<I> {
    Legacy(interceptor)
}

impl<I> Legacy<I> {
    pub fn into_inner(self) -> I {
        self.0
    }
}

/// An interceptor running as a middleware.
#[derive(Debug)]
pub struct Adapted<I> {
    inner: I,
}

pub fn adapt<I: Interceptor>(interceptor: I) -> Adapted<I> {
    Adapted { inner: interceptor }
}

#[async_trait]
impl<I: Interceptor> Middleware for Adapted<I> {
    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
        if self.inner.on_request(ctx).await? == Flow::Continue {
            next.run(ctx).await?;
        }
        self.inner.on_response(ctx).await
    }

    fn name(&self) -> &str {
        std::any::type_name::<I>()
    }
}

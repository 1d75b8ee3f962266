use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareResult, Next};

/// An async function usable as middleware.
///
/// The lifetime ties the returned future to both arguments, which is what an
/// `async fn(&mut Context, Next<'_>)` produces. Any such function satisfies
/// `for<'a> MiddlewareFn<'a>`.
pub trait MiddlewareFn<'a>: Send + Sync {
    type Future: Future<Output = MiddlewareResult> + Send + 'a;

    fn call(&self, ctx: &'a mut Context, next: Next<'a>) -> Self::Future;
}

impl<'a, Func, Fut> MiddlewareFn<'a> for Func
where
    Func: Fn(&'a mut Context, Next<'a>) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareResult> + Send + 'a,
{
    type Future = Fut;

    #[inline]
    fn call(&self, ctx: &'a mut Context, next: Next<'a>) -> Self::Future {
        (self)(ctx, next)
    }
}

pub struct FnMiddleware<F> {
    f: F,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnMiddleware").field(&std::any::type_name::<F>()).finish()
    }
}

/// Wraps an `async fn(&mut Context, Next<'_>) -> MiddlewareResult`.
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> MiddlewareFn<'a>,
{
    FnMiddleware { f }
}

// Written out instead of through `#[async_trait]` so the function's own
// future is boxed directly.
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> MiddlewareFn<'a> + 'static,
{
    fn call<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        ctx: &'life1 mut Context,
        next: Next<'life2>,
    ) -> Pin<Box<dyn Future<Output = MiddlewareResult> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(MiddlewareFn::call(&self.f, ctx, next))
    }

    fn name(&self) -> &str {
        std::any::type_name::<F>()
    }
}

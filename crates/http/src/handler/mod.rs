//! The seam between a connection and whatever answers its requests.

use std::future::Future;

use async_trait::async_trait;

use crate::protocol::{RawRequest, RawResponse};

/// Answers one request by writing to its [`RawResponse`].
///
/// The connection keeps draining the response while `handle` runs, so a
/// handler may write, end or pipe at any point. Dropping the response without
/// ending it makes the connection answer with an empty 500.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: RawRequest, response: RawResponse);
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(RawRequest, RawResponse) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn handle(&self, request: RawRequest, response: RawResponse) {
        (self.f)(request, response).await;
    }
}

/// Wraps an async closure as a [`Handler`].
pub fn make_handler<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(RawRequest, RawResponse) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    HandlerFn { f }
}

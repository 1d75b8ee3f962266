use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareResult, Next};

/// An ordered chain of middleware behaving as one.
///
/// Cheap to clone. As a [`Middleware`] itself it runs its own chain and then
/// continues with the `next` it was given, so chains nest.
#[derive(Clone)]
pub struct Composed {
    chain: Arc<[Arc<dyn Middleware>]>,
}

pub fn compose<I>(entries: I) -> Composed
where
    I: IntoIterator<Item = Arc<dyn Middleware>>,
{
    Composed { chain: entries.into_iter().collect() }
}

impl Composed {
    /// Runs the whole chain against `ctx`.
    pub async fn call(&self, ctx: &mut Context) -> MiddlewareResult {
        Next::new(&self.chain).run(ctx).await
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl fmt::Debug for Composed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.chain.iter().map(|middleware| middleware.name())).finish()
    }
}

#[async_trait]
impl Middleware for Composed {
    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
        Next::nested(&self.chain, next).run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::HttpError;
    use crate::middleware::tests::{Mark, marks, test_context};
    use http::StatusCode;

    struct Fail;

    #[async_trait]
    impl Middleware for Fail {
        async fn call(&self, _ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
            Err(HttpError::new(StatusCode::BAD_REQUEST).into())
        }
    }

    #[tokio::test]
    async fn test_onion_order() {
        for n in 1..=5 {
            let log = Arc::new(Mutex::new(Vec::new()));
            let composed = compose(marks(n, &log));
            let (mut ctx, _receiver) = test_context();

            composed.call(&mut ctx).await.unwrap();

            let expected: Vec<String> =
                (1..=n).map(|id| format!(">{id}")).chain((1..=n).rev().map(|id| format!("<{id}"))).collect();
            assert_eq!(*log.lock().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_short_circuit() {
        for n in 1..=4 {
            for stop in 1..=n {
                let log = Arc::new(Mutex::new(Vec::new()));
                let chain = (1..=n).map(|id| {
                    Arc::new(Mark { id, log: Arc::clone(&log), call_next: id != stop }) as Arc<dyn Middleware>
                });
                let (mut ctx, _receiver) = test_context();

                compose(chain).call(&mut ctx).await.unwrap();

                let log = log.lock().unwrap();
                for id in stop + 1..=n {
                    assert!(!log.contains(&format!(">{id}")), "entry {id} ran after {stop} stopped");
                }
                assert_eq!(log.len(), stop * 2);
            }
        }
    }

    #[tokio::test]
    async fn test_error_skips_downstream() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = marks(2, &log);
        chain.push(Arc::new(Fail));
        chain.push(Arc::new(Mark { id: 4, log: Arc::clone(&log), call_next: true }));
        let (mut ctx, _receiver) = test_context();

        let error = compose(chain).call(&mut ctx).await.unwrap_err();

        assert_eq!(error.downcast_ref::<HttpError>().map(HttpError::status), Some(StatusCode::BAD_REQUEST));
        assert_eq!(*log.lock().unwrap(), vec![">1", ">2"]);
    }

    #[tokio::test]
    async fn test_nested_chains() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = compose(marks(2, &log));
        let outer_first: Arc<dyn Middleware> = Arc::new(Mark { id: 0, log: Arc::clone(&log), call_next: true });
        let outer_last: Arc<dyn Middleware> = Arc::new(Mark { id: 9, log: Arc::clone(&log), call_next: true });
        let inner: Arc<dyn Middleware> = Arc::new(inner);
        let composed = compose([outer_first, inner, outer_last]);
        let (mut ctx, _receiver) = test_context();

        composed.call(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec![">0", ">1", ">2", ">9", "<9", "<2", "<1", "<0"]);
        assert_eq!(composed.len(), 3);
    }
}

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use http::StatusCode;
use onion_http::handler::Handler;
use onion_http::protocol::{Completion, RawRequest, RawResponse};
use tracing::{debug, error};

use crate::body::Body;
use crate::context::Context;
use crate::error::{Failure, PanicPayload};
use crate::error_sink::ErrorListener;
use crate::middleware::Composed;
use crate::responder::respond;
use crate::template::Shared;

/// Runs one request from raw pair to finished response.
///
/// Built by `Application::callback`; a snapshot of the application at that
/// moment, so later registrations don't affect it.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    chain: Composed,
    listeners: Arc<[Arc<dyn ErrorListener>]>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>, chain: Composed, listeners: Arc<[Arc<dyn ErrorListener>]>) -> Self {
        Self { shared, chain, listeners }
    }

    /// Drives the chain against `ctx`, racing it with the connection's failure.
    ///
    /// The chain wins a tie. Whatever loses is dropped.
    async fn run(&self, ctx: &mut Context) -> Result<(), Failure> {
        let failed = ctx.response().raw().completion().failed();
        let chain = AssertUnwindSafe(self.chain.call(ctx)).catch_unwind();

        tokio::select! {
            biased;
            settled = chain => match settled {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Failure::Handler(e)),
                Err(payload) => Err(Failure::NonError(PanicPayload::new(payload))),
            },
            e = failed => Err(Failure::Transport(e)),
        }
    }

    /// Tells every listener, then answers with an error response unless
    /// something was already sent.
    fn fail(&self, failure: &Failure, ctx: &mut Context) {
        let untouchable = ctx.headers_sent() || !ctx.writable();

        self.notify(failure, ctx);

        if untouchable {
            debug!(cause = %failure, "response already sent, error response skipped");
            return;
        }

        if let Err(e) = ctx.response_mut().write_failure(failure) {
            error!(cause = %e, "failed to write error response");
        }
    }

    fn notify(&self, failure: &Failure, ctx: &Context) {
        for listener in self.listeners.iter() {
            if let Err(e) = listener.on_error(failure, ctx) {
                error!(cause = %e, "error listener failed");
            }
        }
    }
}

#[async_trait]
impl Handler for Dispatcher {
    async fn handle(&self, request: RawRequest, mut response: RawResponse) {
        response.set_status(StatusCode::NOT_FOUND);
        let mut ctx = Context::new(Arc::clone(&self.shared), request, response);

        match self.run(&mut ctx).await {
            Ok(()) => {
                let piping = ctx.respond() && ctx.body().is_some_and(Body::is_stream);
                let completion = ctx.response().raw().completion();
                respond(&mut ctx);

                // a piped body can still break after the chain settled
                if piping {
                    if let Completion::Failed(e) = completion.settled().await {
                        self.notify(&Failure::Transport(e), &ctx);
                    }
                }
            }
            Err(failure) => self.fail(&failure, &mut ctx),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.shared.config)
            .field("chain", &self.chain)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

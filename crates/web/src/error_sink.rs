//! Listeners told about every failed request.

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::error::{Failure, NonErrorThrownError};

/// Observes failures after the chain settled with one.
///
/// Listeners run in subscription order. An `Err` is logged and does not stop
/// the ones after it.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorListener: Send + Sync {
    fn on_error(&self, failure: &Failure, ctx: &Context) -> Result<(), NonErrorThrownError>;
}

pub struct FnListener<F> {
    f: F,
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnListener").field(&std::any::type_name::<F>()).finish()
    }
}

impl<F> ErrorListener for FnListener<F>
where
    F: Fn(&Failure, &Context) -> Result<(), NonErrorThrownError> + Send + Sync,
{
    fn on_error(&self, failure: &Failure, ctx: &Context) -> Result<(), NonErrorThrownError> {
        (self.f)(failure, ctx)
    }
}

pub fn listener_fn<F>(f: F) -> FnListener<F>
where
    F: Fn(&Failure, &Context) -> Result<(), NonErrorThrownError> + Send + Sync,
{
    FnListener { f }
}

/// Installed when the application subscribed no listener of its own.
///
/// Stays quiet for `404`s, for errors meant for the client and when the
/// application is configured `silent`; logs everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorListener;

impl ErrorListener for DefaultErrorListener {
    fn on_error(&self, failure: &Failure, ctx: &Context) -> Result<(), NonErrorThrownError> {
        if let Failure::NonError(payload) = failure {
            return Err(NonErrorThrownError::new(payload.to_string()));
        }

        if failure.status() == Some(StatusCode::NOT_FOUND) || failure.expose() || ctx.config().silent {
            return Ok(());
        }

        error!("\n{}\n", format_failure(failure));
        Ok(())
    }
}

/// The failure and its chain of sources, one per line, indented by two spaces.
pub fn format_failure(failure: &Failure) -> String {
    let mut lines = vec![failure.to_string()];
    let mut source = failure.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }

    lines.iter().flat_map(|line| line.lines()).map(|line| format!("  {line}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::{Method, StatusCode, Version};
    use onion_http::protocol::{RawRequest, RawResponse};

    use super::*;
    use crate::config::Config;
    use crate::error::{HttpError, PanicPayload};
    use crate::middleware::tests::test_context;
    use crate::template::Shared;

    #[test]
    fn test_format_failure() {
        let error = HttpError::with_message(StatusCode::BAD_GATEWAY, "upstream failed")
            .with_source(io::Error::other("connection reset\nby peer"));
        let text = format_failure(&Failure::Handler(Box::new(error)));

        assert_eq!(text, "  upstream failed\n  caused by: connection reset\n  by peer");
    }

    #[test]
    fn test_default_rejects_non_errors() {
        let (ctx, _receiver) = test_context();
        let failure = Failure::NonError(PanicPayload::new(Box::new("boom")));

        let e = DefaultErrorListener.on_error(&failure, &ctx).unwrap_err();
        assert_eq!(e.payload(), "boom");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Runs the default listener and returns what it logged.
    fn logged(failure: &Failure, ctx: &Context) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            assert!(DefaultErrorListener.on_error(failure, ctx).is_ok());
        });
        captured.text()
    }

    #[test]
    fn test_default_stays_quiet_for_client_errors() {
        let (ctx, _receiver) = test_context();

        let not_found = Failure::Handler(Box::new(HttpError::new(StatusCode::NOT_FOUND).with_expose(false)));
        assert_eq!(logged(&not_found, &ctx), "");

        let forbidden = Failure::Handler(Box::new(HttpError::with_message(StatusCode::FORBIDDEN, "members only")));
        assert_eq!(logged(&forbidden, &ctx), "");
    }

    #[test]
    fn test_default_stays_quiet_when_silent() {
        let raw_request = RawRequest::from(http::Request::get("/").body(Bytes::new()).unwrap());
        let (raw_response, _receiver) = RawResponse::channel(Version::HTTP_11, &Method::GET);
        let config = Config { silent: true, ..Config::default() };
        let ctx = Context::new(Shared::new(config), raw_request, raw_response);

        assert_eq!(logged(&Failure::Handler("boom".into()), &ctx), "");
    }

    #[test]
    fn test_default_logs_server_errors() {
        let (ctx, _receiver) = test_context();

        let output = logged(&Failure::Handler("boom".into()), &ctx);
        assert!(output.contains("ERROR"), "{output:?}");
        assert!(output.contains(": \n  boom\n\n"), "{output:?}");
    }

    #[test]
    fn test_listener_fn() {
        let (ctx, _receiver) = test_context();
        let listener = listener_fn(|failure: &Failure, _ctx: &Context| {
            if failure.is_error() { Ok(()) } else { Err(NonErrorThrownError::new("rejected")) }
        });

        assert!(listener.on_error(&Failure::Handler("boom".into()), &ctx).is_ok());
        assert!(listener.on_error(&Failure::NonError(PanicPayload::new(Box::new(1_u8))), &ctx).is_err());
    }
}

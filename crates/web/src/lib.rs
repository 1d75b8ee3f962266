//! The request lifecycle of onion: middleware, context and response.
//!
//! An [`Application`] holds an ordered list of [`Middleware`]. For every
//! request the [`Dispatcher`] builds a fresh [`Context`], runs the middleware
//! as an onion (each one wraps everything registered after it), and then
//! either writes the response the context describes or, if the chain failed,
//! tells the error listeners and answers with an error response.
//!
//! ```no_run
//! use onion_web::{Application, Context, MiddlewareResult, Next, middleware_fn};
//!
//! async fn logger(ctx: &mut Context, next: Next<'_>) -> MiddlewareResult {
//!     next.run(ctx).await?;
//!     tracing::info!(method = %ctx.method(), path = ctx.path(), status = %ctx.status(), "request");
//!     Ok(())
//! }
//!
//! async fn hello(ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
//!     ctx.set_body("Hello World!");
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut app = Application::new();
//!     app.register(middleware_fn(logger)).and_then(|app| app.register(middleware_fn(hello))).expect("valid middleware");
//!     app.listen("127.0.0.1:3000").await
//! }
//! ```

mod application;
mod body;
mod config;
mod context;
mod dispatcher;
mod request;
mod responder;
mod response;
mod template;

pub mod error;
pub mod error_sink;
pub mod middleware;
pub mod status;

pub use application::{Application, ApplicationBuilder};
pub use body::Body;
pub use config::Config;
pub use context::Context;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, Failure, HttpError, InvalidMiddlewareError, NonErrorThrownError};
pub use error_sink::{DefaultErrorListener, ErrorListener, listener_fn};
pub use middleware::{Middleware, MiddlewareResult, Next, compose, legacy, middleware_fn};
pub use request::Request;
pub use responder::respond;
pub use response::Response;
pub use template::{Shared, Template, Templates};

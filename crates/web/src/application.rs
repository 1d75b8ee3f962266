use std::fmt;
use std::io;
use std::sync::Arc;

use onion_http::connection::HttpConnection;
use onion_http::protocol::{RawRequest, RawResponse};
use serde_json::Value;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{Level, debug, error, info, warn};

use crate::config::Config;
use crate::context::Context;
use crate::dispatcher::Dispatcher;
use crate::error::InvalidMiddlewareError;
use crate::error_sink::{DefaultErrorListener, ErrorListener};
use crate::middleware::{IntoMiddleware, Middleware, compose};
use crate::template::{Shared, Template};

/// The middleware, error listeners, templates and settings of a server.
///
/// ```no_run
/// use onion_web::{Application, Context, MiddlewareResult, Next, middleware_fn};
///
/// async fn hello(ctx: &mut Context, _next: Next<'_>) -> MiddlewareResult {
///     ctx.set_body("Hello World!");
///     Ok(())
/// }
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let mut app = Application::new();
///     app.register(middleware_fn(hello)).expect("hello is a middleware");
///     app.listen("127.0.0.1:3000").await
/// }
/// ```
pub struct Application {
    shared: Arc<Shared>,
    middleware: Vec<Arc<dyn Middleware>>,
    listeners: Vec<Arc<dyn ErrorListener>>,
}

#[derive(Debug, Default)]
pub struct ApplicationBuilder {
    config: Config,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.config.env = env.into();
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: bool) -> Self {
        self.config.proxy = proxy;
        self
    }

    #[must_use]
    pub fn subdomain_offset(mut self, offset: usize) -> Self {
        self.config.subdomain_offset = offset;
        self
    }

    #[must_use]
    pub fn proxy_ip_header(mut self, header: impl Into<String>) -> Self {
        self.config.proxy_ip_header = header.into();
        self
    }

    #[must_use]
    pub fn max_ips_count(mut self, count: usize) -> Self {
        self.config.max_ips_count = count;
        self
    }

    #[must_use]
    pub fn keys(mut self, keys: Vec<String>) -> Self {
        self.config.keys = Some(keys);
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.config.silent = silent;
        self
    }

    pub fn build(self) -> Application {
        Application::with_config(self.config)
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn with_config(config: Config) -> Self {
        Self { shared: Shared::new(config), middleware: Vec::new(), listeners: Vec::new() }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Changes the settings of dispatchers created from now on.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut Arc::make_mut(&mut self.shared).config
    }

    /// Appends a middleware; the chain runs them in registration order.
    ///
    /// `None` is rejected and leaves the application unchanged.
    pub fn register<M: IntoMiddleware>(&mut self, entry: M) -> Result<&mut Self, InvalidMiddlewareError> {
        let middleware = entry.into_middleware()?;
        debug!(name = middleware.name(), position = self.middleware.len(), "register middleware");
        self.middleware.push(middleware);
        Ok(self)
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Subscribes a listener to failed requests. Replaces the default one,
    /// which only runs when nothing is subscribed.
    pub fn on_error<L: ErrorListener + 'static>(&mut self, listener: L) -> &mut Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn context_template_mut(&mut self) -> &mut Template {
        &mut Arc::make_mut(&mut self.shared).templates.context
    }

    pub fn request_template_mut(&mut self) -> &mut Template {
        &mut Arc::make_mut(&mut self.shared).templates.request
    }

    pub fn response_template_mut(&mut self) -> &mut Template {
        &mut Arc::make_mut(&mut self.shared).templates.response
    }

    /// A fresh context for the raw pair, without running anything.
    pub fn create_context(&self, request: RawRequest, response: RawResponse) -> Context {
        Context::new(Arc::clone(&self.shared), request, response)
    }

    /// The handler a connection calls for each request.
    pub fn callback(&self) -> Dispatcher {
        let listeners: Arc<[Arc<dyn ErrorListener>]> = if self.listeners.is_empty() {
            Arc::new([Arc::new(DefaultErrorListener) as Arc<dyn ErrorListener>])
        } else {
            self.listeners.iter().cloned().collect()
        };
        Dispatcher::new(Arc::clone(&self.shared), compose(self.middleware.iter().cloned()), listeners)
    }

    pub fn to_json(&self) -> Value {
        self.shared.config.to_json()
    }

    /// Binds `address` and serves until the process exits.
    pub async fn listen<A: ToSocketAddrs>(&self, address: A) -> io::Result<()> {
        // a subscriber installed by the host wins
        let _ = tracing_subscriber::fmt().with_max_level(Level::INFO).try_init();

        let tcp_listener = TcpListener::bind(address).await.inspect_err(|e| error!(cause = %e, "bind server error"))?;
        info!(address = ?tcp_listener.local_addr().ok(), "start listening");
        self.serve(tcp_listener).await
    }

    /// Serves connections accepted by `tcp_listener`, one task each.
    pub async fn serve(&self, tcp_listener: TcpListener) -> io::Result<()> {
        let handler = Arc::new(self.callback());

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer).with_remote_addr(remote_addr);
                match connection.process(handler).await {
                    Ok(()) => {
                        debug!(%remote_addr, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(cause = %e, %remote_addr, "service has error, connection shutdown");
                    }
                }
            });
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

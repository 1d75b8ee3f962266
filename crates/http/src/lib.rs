//! The HTTP/1.x transport underneath onion.
//!
//! This crate owns the socket side of an exchange: it parses requests,
//! buffers their bodies, and turns what a handler writes into bytes on the
//! wire. It knows nothing about middleware; a [`handler::Handler`] receives a
//! [`protocol::RawRequest`] and a [`protocol::RawResponse`] and answers however
//! it likes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use onion_http::connection::HttpConnection;
//! use onion_http::handler::make_handler;
//! use onion_http::protocol::{RawRequest, RawResponse};
//!
//! #[tokio::main]
//! async fn main() {
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer).with_remote_addr(remote_addr);
//!             if let Err(e) = connection.process(handler).await {
//!                 error!(cause = %e, "connection shutdown with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: RawRequest, mut response: RawResponse) {
//!     info!(path = request.uri().path(), "receive request");
//!     let _ = response.end(Some(Bytes::from_static(b"Hello World!\r\n")));
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: connection lifecycle, keep-alive and pipelining
//! - [`protocol`]: request, response and completion types
//! - [`codec`]: wire encoding and decoding
//! - [`handler`]: the [`handler::Handler`] seam
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only, no TLS
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//! - Request bodies are buffered, 2MB by default

pub mod codec;
pub mod connection;
pub mod date;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;

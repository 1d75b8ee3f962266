//! HTTP connection handling module
//!
//! [`HttpConnection`] drives one client connection: it decodes requests,
//! hands each one to a [`Handler`](crate::handler::Handler) together with a
//! [`RawResponse`](crate::protocol::RawResponse), and writes back whatever the
//! handler emits.
//!
//! # Features
//!
//! - Keep-alive and pipelined requests, answered in order
//! - Expect-continue mechanism
//! - Buffered request bodies with a size limit
//! - `400`, `413` and `431` answers for requests that can't be read

mod http_connection;

pub use http_connection::DEFAULT_MAX_BODY_SIZE;
pub use http_connection::HttpConnection;

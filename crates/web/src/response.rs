use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, AsHeaderName, HeaderValue, IntoHeaderName, InvalidHeaderValue};
use http::{HeaderMap, StatusCode};
use mime::Mime;
use onion_http::protocol::{RawResponse, SendError};
use tracing::trace;

use crate::body::Body;
use crate::config::Config;
use crate::error::Failure;
use crate::status;
use crate::template::Shared;

pub(crate) const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// The response side of one exchange.
///
/// Status and headers live on the raw response; the body stays here until
/// the request settles and the responder writes it.
#[derive(Debug)]
pub struct Response {
    shared: Arc<Shared>,
    raw: RawResponse,
    body: Option<Body>,
    explicit_status: bool,
    message: Option<String>,
}

impl Response {
    pub(crate) fn new(shared: Arc<Shared>, raw: RawResponse) -> Self {
        Self { shared, raw, body: None, explicit_status: false, message: None }
    }

    pub fn raw(&self) -> &RawResponse {
        &self.raw
    }

    /// The raw handle, for middleware that writes on its own.
    pub fn raw_mut(&mut self) -> &mut RawResponse {
        &mut self.raw
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// A value from the response template.
    pub fn shared<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.shared.templates.response.get::<T>()
    }

    pub fn status(&self) -> StatusCode {
        self.raw.status()
    }

    /// Sets the status and marks it explicit. Ignored once headers are sent.
    ///
    /// An empty-body status drops the current body.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.raw.headers_sent() {
            trace!(%status, "headers already sent, status ignored");
            return;
        }
        self.explicit_status = true;
        self.raw.set_status(status);
        self.message = None;
        if self.body.is_some() && status::is_empty_body(status) {
            self.clear_body();
        }
    }

    pub fn is_explicit_status(&self) -> bool {
        self.explicit_status
    }

    /// The status message, falling back to the reason phrase.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_else(|| status::message(self.raw.status()))
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut()
    }

    /// Sets the body, along with a `200` status unless one was set explicitly,
    /// and a content type and length matching the body.
    ///
    /// An existing `Content-Type` is kept, except for JSON.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        let body = body.into();
        let replaced = self.body.is_some();

        if !self.explicit_status {
            self.set_status(StatusCode::OK);
        }

        let set_type = !self.has_header(header::CONTENT_TYPE);
        match &body {
            Body::Text(text) => {
                if set_type {
                    let html = text.trim_start().starts_with('<');
                    self.set_content_type_str(if html { TEXT_HTML } else { TEXT_PLAIN });
                }
                self.set_length(text.len() as u64);
            }
            Body::Bytes(bytes) => {
                if set_type {
                    self.set_content_type_str(OCTET_STREAM);
                }
                self.set_length(bytes.len() as u64);
            }
            Body::Stream(_) => {
                if replaced {
                    self.remove_header(header::CONTENT_LENGTH);
                }
                if set_type {
                    self.set_content_type_str(OCTET_STREAM);
                }
            }
            Body::Json(_) => {
                self.remove_header(header::CONTENT_LENGTH);
                self.set_content_type_str(APPLICATION_JSON);
            }
        }

        self.body = Some(body);
    }

    /// Drops the body and its framing headers, setting `204` unless the
    /// status already forbids a body.
    pub fn clear_body(&mut self) {
        self.body = None;
        if !status::is_empty_body(self.raw.status()) {
            self.set_status(StatusCode::NO_CONTENT);
        }
        self.remove_header(header::CONTENT_TYPE);
        self.remove_header(header::CONTENT_LENGTH);
        self.remove_header(header::TRANSFER_ENCODING);
    }

    /// Moves the body out without touching status or headers.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// `Content-Length` when set, else the body's own length when known.
    pub fn length(&self) -> Option<u64> {
        match self.header(header::CONTENT_LENGTH) {
            Some(value) => value.trim().parse().ok(),
            None => self.body.as_ref().and_then(Body::len),
        }
    }

    pub fn set_length(&mut self, length: u64) {
        self.set_header(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.header(header::CONTENT_TYPE).and_then(|value| value.parse().ok())
    }

    pub fn set_content_type(&mut self, content_type: &Mime) -> Result<(), InvalidHeaderValue> {
        let value = HeaderValue::from_str(content_type.as_ref())?;
        self.set_header(header::CONTENT_TYPE, value);
        Ok(())
    }

    pub(crate) fn set_content_type_str(&mut self, content_type: &'static str) {
        self.set_header(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    pub fn headers(&self) -> &HeaderMap {
        self.raw.headers()
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.raw.headers().get(name).and_then(|value| value.to_str().ok())
    }

    pub fn has_header<K: AsHeaderName>(&self, name: K) -> bool {
        self.raw.headers().contains_key(name)
    }

    /// Header writes are ignored once headers are sent.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        if !self.raw.headers_sent() {
            self.raw.headers_mut().insert(name, value);
        }
    }

    pub fn append_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        if !self.raw.headers_sent() {
            self.raw.headers_mut().append(name, value);
        }
    }

    pub fn remove_header<K: AsHeaderName>(&mut self, name: K) {
        if !self.raw.headers_sent() {
            self.raw.headers_mut().remove(name);
        }
    }

    /// Redirects to `url` with `302` unless a redirect status is already set.
    pub fn redirect(&mut self, url: &str) -> Result<(), InvalidHeaderValue> {
        let location = HeaderValue::from_str(url)?;
        self.set_header(header::LOCATION, location);

        if !status::is_redirect(self.raw.status()) {
            self.set_status(StatusCode::FOUND);
        }

        self.set_content_type_str(TEXT_PLAIN);
        self.set_body(format!("Redirecting to {url}."));
        Ok(())
    }

    pub fn headers_sent(&self) -> bool {
        self.raw.headers_sent()
    }

    pub fn writable(&self) -> bool {
        self.raw.writable()
    }

    /// Replaces whatever was prepared with a plain text error response and ends it.
    pub(crate) fn write_failure(&mut self, failure: &Failure) -> Result<(), SendError> {
        self.body = None;

        let headers = self.raw.headers_mut();
        headers.clear();
        if let Some(extra) = failure.headers() {
            for (name, value) in extra {
                headers.append(name.clone(), value.clone());
            }
        }
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));

        let status = failure.response_status();
        self.set_status(status);

        let message = if failure.expose() { failure.to_string() } else { status::message(status).to_owned() };
        self.set_length(message.len() as u64);
        self.raw.end(Some(Bytes::from(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use http::{Method, Version};
    use onion_http::protocol::ResponseReceiver;
    use serde_json::json;

    fn response() -> (Response, ResponseReceiver) {
        let (mut raw, receiver) = RawResponse::channel(Version::HTTP_11, &Method::GET);
        raw.set_status(StatusCode::NOT_FOUND);
        (Response::new(Shared::new(Config::default()), raw), receiver)
    }

    #[test]
    fn test_text_body_sets_status_type_and_length() {
        let (mut response, _receiver) = response();
        response.set_body("héllo");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header(header::CONTENT_TYPE), Some("text/plain; charset=utf-8"));
        assert_eq!(response.length(), Some(6));
    }

    #[test]
    fn test_html_body() {
        let (mut response, _receiver) = response();
        response.set_body("  <h1>hi</h1>");
        assert_eq!(response.header(header::CONTENT_TYPE), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_explicit_status_survives_body() {
        let (mut response, _receiver) = response();
        response.set_status(StatusCode::CREATED);
        response.set_body(Bytes::from_static(b"abc"));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.header(header::CONTENT_TYPE), Some("application/octet-stream"));
        assert_eq!(response.length(), Some(3));
    }

    #[test]
    fn test_existing_content_type_is_kept() {
        let (mut response, _receiver) = response();
        response.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        response.set_body("a,b");
        assert_eq!(response.header(header::CONTENT_TYPE), Some("text/csv"));
    }

    #[test]
    fn test_json_body_drops_length() {
        let (mut response, _receiver) = response();
        response.set_body("text first");
        response.set_body(json!({"a": 1}));

        assert_eq!(response.header(header::CONTENT_TYPE), Some("application/json; charset=utf-8"));
        assert!(!response.has_header(header::CONTENT_LENGTH));
        assert_eq!(response.length(), Some(7));
    }

    #[test]
    fn test_stream_body_replacing_drops_length() {
        let (mut response, _receiver) = response();
        response.set_body("text first");
        response.set_body(Body::stream(futures::stream::empty()));

        assert!(!response.has_header(header::CONTENT_LENGTH));
        assert_eq!(response.length(), None);
        assert_eq!(response.content_type(), Some(mime::APPLICATION_OCTET_STREAM));
    }

    #[test]
    fn test_clear_body() {
        let (mut response, _receiver) = response();
        response.set_body("gone");
        response.clear_body();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_none());
        assert!(!response.has_header(header::CONTENT_TYPE));
        assert!(!response.has_header(header::CONTENT_LENGTH));
    }

    #[test]
    fn test_empty_status_drops_body() {
        let (mut response, _receiver) = response();
        response.set_body("cached");
        response.set_status(StatusCode::NOT_MODIFIED);

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.body().is_none());
    }

    #[test]
    fn test_message() {
        let (mut response, _receiver) = response();
        assert_eq!(response.message(), "Not Found");
        response.set_message("Nothing Here");
        assert_eq!(response.message(), "Nothing Here");
        response.set_status(StatusCode::OK);
        assert_eq!(response.message(), "OK");
    }

    #[test]
    fn test_redirect() {
        let (mut response, _receiver) = response();
        response.redirect("/login").unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(header::LOCATION), Some("/login"));
        assert!(matches!(response.body(), Some(Body::Text(text)) if text == "Redirecting to /login."));

        let (mut response, _receiver) = self::response();
        response.set_status(StatusCode::MOVED_PERMANENTLY);
        response.redirect("/moved").unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[test]
    fn test_writes_ignored_after_headers_sent() {
        let (mut response, _receiver) = response();
        response.raw_mut().write_head().unwrap();

        response.set_status(StatusCode::OK);
        response.set_header("x-late", HeaderValue::from_static("1"));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.has_header("x-late"));
    }

    #[tokio::test]
    async fn test_write_failure() {
        let (mut response, receiver) = response();
        response.set_header("x-stale", HeaderValue::from_static("1"));
        response.set_body("partial");

        let error = HttpError::with_message(StatusCode::UNPROCESSABLE_ENTITY, "bad field")
            .with_header(header::RETRY_AFTER, HeaderValue::from_static("10"));
        response.write_failure(&Failure::Handler(Box::new(error))).unwrap();
        drop(response);

        let collected = receiver.collect().await.unwrap();
        assert_eq!(collected.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert_eq!(collected.header("x-stale"), None);
        assert_eq!(collected.header(header::RETRY_AFTER), Some("10"));
        assert_eq!(collected.header(header::CONTENT_TYPE), Some("text/plain; charset=utf-8"));
        assert_eq!(collected.body.as_ref(), b"bad field");
    }

    #[tokio::test]
    async fn test_write_failure_hides_server_errors() {
        let (mut response, receiver) = response();
        response.write_failure(&Failure::Handler("database password is hunter2".into())).unwrap();
        drop(response);

        let collected = receiver.collect().await.unwrap();
        assert_eq!(collected.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(collected.body.as_ref(), b"Internal Server Error");
    }
}

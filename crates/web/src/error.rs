use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::io;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use onion_http::protocol::TransportError;
use thiserror::Error;

use crate::status;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error that knows which response it should produce.
///
/// `expose` decides whether the message reaches the client; it defaults to
/// true for client errors and false for server errors.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    expose: bool,
    headers: HeaderMap,
    #[source]
    source: Option<BoxError>,
}

impl HttpError {
    /// An error carrying the reason phrase of `status` as its message.
    pub fn new(status: StatusCode) -> Self {
        let status = Self::error_status(status);
        Self::with_message(status, status::message(status))
    }

    /// Statuses below 400 are not errors and become `500`.
    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        let status = Self::error_status(status);
        Self {
            status,
            message: message.into(),
            expose: status.is_client_error(),
            headers: HeaderMap::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn expose(&self) -> bool {
        self.expose
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn error_status(status: StatusCode) -> StatusCode {
        if status.as_u16() < 400 { StatusCode::INTERNAL_SERVER_ERROR } else { status }
    }
}

/// Returned by `register` for an entry that holds no middleware.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("middleware must be a function")]
pub struct InvalidMiddlewareError;

/// A value that is not an error reached an error listener.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("non-error thrown: {payload}")]
pub struct NonErrorThrownError {
    payload: String,
}

impl NonErrorThrownError {
    pub fn new(payload: impl Into<String>) -> Self {
        Self { payload: payload.into() }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// The payload of a panic caught while running the middleware chain.
pub struct PanicPayload(Box<dyn Any + Send>);

impl PanicPayload {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Some(message) = self.0.downcast_ref::<&'static str>() {
            return Some(*message);
        }
        self.0.downcast_ref::<String>().map(String::as_str)
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.as_str()).finish()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("<non-string panic payload>"))
    }
}

/// Why a request did not settle successfully.
#[derive(Debug)]
pub enum Failure {
    /// A middleware returned an error.
    Handler(BoxError),
    /// The connection failed or closed before the chain settled.
    Transport(TransportError),
    /// A middleware panicked.
    NonError(PanicPayload),
}

impl Failure {
    pub fn is_error(&self) -> bool {
        !matches!(self, Failure::NonError(_))
    }

    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            Failure::Handler(e) => e.downcast_ref::<HttpError>(),
            _ => None,
        }
    }

    /// The status the failure carries itself, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.http_error().map(HttpError::status)
    }

    /// The status of the error response: the carried one, `404` for io
    /// errors meaning "not found", `500` otherwise.
    pub fn response_status(&self) -> StatusCode {
        if let Some(status) = self.status() {
            return status;
        }

        let not_found = match self {
            Failure::Handler(e) => e.downcast_ref::<io::Error>().is_some_and(|e| e.kind() == io::ErrorKind::NotFound),
            Failure::Transport(TransportError::Io { source }) => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        };

        if not_found { StatusCode::NOT_FOUND } else { StatusCode::INTERNAL_SERVER_ERROR }
    }

    pub fn expose(&self) -> bool {
        self.http_error().is_some_and(HttpError::expose)
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.http_error().map(HttpError::headers)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Handler(e) => fmt::Display::fmt(e, f),
            Failure::Transport(e) => fmt::Display::fmt(e, f),
            Failure::NonError(payload) => write!(f, "non-error thrown: {payload}"),
        }
    }
}

// Display already shows the wrapped error, so the chain starts at its source.
impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Failure::Handler(e) => e.source(),
            Failure::Transport(e) => e.source(),
            Failure::NonError(_) => None,
        }
    }
}

impl From<TransportError> for Failure {
    fn from(e: TransportError) -> Self {
        Failure::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_http_error_defaults() {
        let e = HttpError::new(StatusCode::NOT_FOUND);
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        assert_eq!(e.to_string(), "Not Found");
        assert!(e.expose());

        let e = HttpError::with_message(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(e.to_string(), "upstream down");
        assert!(!e.expose());
    }

    #[test]
    fn test_http_error_non_error_status() {
        let e = HttpError::new(StatusCode::OK);
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.expose());
    }

    #[test]
    fn test_http_error_source() {
        let e = HttpError::new(StatusCode::BAD_REQUEST).with_source(io::Error::other("boom"));
        assert_eq!(e.source().map(ToString::to_string), Some("boom".to_owned()));
    }

    #[test]
    fn test_failure_status() {
        let failure = Failure::Handler(Box::new(HttpError::new(StatusCode::FORBIDDEN)));
        assert_eq!(failure.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(failure.response_status(), StatusCode::FORBIDDEN);
        assert!(failure.expose());

        let failure = Failure::Handler(Box::new(io::Error::new(io::ErrorKind::NotFound, "missing")));
        assert_eq!(failure.status(), None);
        assert_eq!(failure.response_status(), StatusCode::NOT_FOUND);
        assert!(!failure.expose());

        let failure = Failure::Handler("plain".into());
        assert_eq!(failure.response_status(), StatusCode::INTERNAL_SERVER_ERROR);

        let failure = Failure::Transport(TransportError::Io { source: Arc::new(io::ErrorKind::NotFound.into()) });
        assert_eq!(failure.response_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_panic_payload_display() {
        assert_eq!(PanicPayload::new(Box::new("static")).to_string(), "static");
        assert_eq!(PanicPayload::new(Box::new(String::from("owned"))).to_string(), "owned");
        assert_eq!(PanicPayload::new(Box::new(7_u8)).to_string(), "<non-string panic payload>");

        let failure = Failure::NonError(PanicPayload::new(Box::new("oops")));
        assert!(!failure.is_error());
        assert_eq!(failure.to_string(), "non-error thrown: oops");
    }

    #[test]
    fn test_failure_source_chain() {
        let inner = HttpError::new(StatusCode::BAD_REQUEST).with_source(io::Error::other("root cause"));
        let failure = Failure::Handler(Box::new(inner));
        assert_eq!(failure.to_string(), "Bad Request");
        assert_eq!(failure.source().map(ToString::to_string), Some("root cause".to_owned()));
    }
}

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use http::header::{self, AsHeaderName, HeaderValue, IntoHeaderName, InvalidHeaderValue};
use http::{Extensions, HeaderMap, Method, StatusCode, Uri};
use onion_http::protocol::{RawRequest, RawResponse};

use crate::body::Body;
use crate::config::Config;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::template::Shared;

/// Everything one request owns while it travels through the middleware.
///
/// Created once per request and dropped when the request settles. Nothing
/// in it is shared with another request except the read-only [`Shared`]
/// application data.
#[derive(Debug)]
pub struct Context {
    shared: Arc<Shared>,
    request: Request,
    response: Response,
    state: Extensions,
    respond: bool,
}

impl Context {
    pub fn new(shared: Arc<Shared>, raw_request: RawRequest, raw_response: RawResponse) -> Self {
        Self {
            request: Request::new(Arc::clone(&shared), raw_request),
            response: Response::new(Arc::clone(&shared), raw_response),
            shared,
            state: Extensions::new(),
            respond: true,
        }
    }

    pub fn app(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// A value from the context template.
    pub fn shared<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.shared.templates.context.get::<T>()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Per-request values for middleware to hand each other.
    pub fn state(&self) -> &Extensions {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Extensions {
        &mut self.state
    }

    pub fn respond(&self) -> bool {
        self.respond
    }

    /// `false` leaves the response to the middleware: nothing is written
    /// once the chain settles.
    pub fn set_respond(&mut self, respond: bool) {
        self.respond = respond;
    }

    pub fn original_url(&self) -> &Uri {
        self.request.original_url()
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn set_method(&mut self, method: Method) {
        self.request.set_method(method);
    }

    pub fn url(&self) -> &Uri {
        self.request.url()
    }

    pub fn set_url(&mut self, url: Uri) {
        self.request.set_url(url);
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn querystring(&self) -> &str {
        self.request.querystring()
    }

    /// A request header.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.request.header(name)
    }

    pub fn host(&self) -> Option<&str> {
        self.request.host()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.request.hostname()
    }

    pub fn protocol(&self) -> &str {
        self.request.protocol()
    }

    pub fn secure(&self) -> bool {
        self.request.secure()
    }

    pub fn origin(&self) -> String {
        self.request.origin()
    }

    pub fn href(&self) -> String {
        self.request.href()
    }

    pub fn ips(&self) -> Vec<&str> {
        self.request.ips()
    }

    pub fn ip(&self) -> String {
        self.request.ip()
    }

    pub fn subdomains(&self) -> Vec<&str> {
        self.request.subdomains()
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn message(&self) -> &str {
        self.response.message()
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.response.set_message(message);
    }

    pub fn body(&self) -> Option<&Body> {
        self.response.body()
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.response.set_body(body);
    }

    pub fn clear_body(&mut self) {
        self.response.clear_body();
    }

    pub fn length(&self) -> Option<u64> {
        self.response.length()
    }

    pub fn set_length(&mut self, length: u64) {
        self.response.set_length(length);
    }

    /// A response header to be sent.
    pub fn response_header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.response.header(name)
    }

    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.response.set_header(name, value);
    }

    pub fn append_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.response.append_header(name, value);
    }

    pub fn remove_header<K: AsHeaderName>(&mut self, name: K) {
        self.response.remove_header(name);
    }

    pub fn redirect(&mut self, url: &str) -> Result<(), InvalidHeaderValue> {
        self.response.redirect(url)
    }

    pub fn headers_sent(&self) -> bool {
        self.response.headers_sent()
    }

    pub fn writable(&self) -> bool {
        self.response.writable()
    }

    /// Builds the error for a middleware to return:
    ///
    /// ```ignore
    /// return Err(ctx.throw(StatusCode::FORBIDDEN, "members only").into());
    /// ```
    pub fn throw(&self, status: StatusCode, message: impl Into<String>) -> HttpError {
        HttpError::with_message(status, message)
    }

    /// `Err` with the given status and message unless `condition` holds.
    pub fn assert(&self, condition: bool, status: StatusCode, message: impl Into<String>) -> Result<(), HttpError> {
        if condition { Ok(()) } else { Err(self.throw(status, message)) }
    }

    /// Whether the client's cached copy is still valid, judged by
    /// `If-None-Match` and `If-Modified-Since` against the response's
    /// `ETag` and `Last-Modified`.
    pub fn fresh(&self) -> bool {
        let method = self.method();
        if *method != Method::GET && *method != Method::HEAD {
            return false;
        }

        let status = self.status();
        if !status.is_success() && status != StatusCode::NOT_MODIFIED {
            return false;
        }

        is_fresh(self.request.headers(), self.response.headers())
    }

    pub fn stale(&self) -> bool {
        !self.fresh()
    }
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_http_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value.trim()).ok()
}

fn is_fresh(request: &HeaderMap, response: &HeaderMap) -> bool {
    let modified_since = header_str(request, header::IF_MODIFIED_SINCE);
    let none_match = header_str(request, header::IF_NONE_MATCH);
    if modified_since.is_none() && none_match.is_none() {
        return false;
    }

    let no_cache = header_str(request, header::CACHE_CONTROL)
        .is_some_and(|value| value.split(',').any(|directive| directive.trim().eq_ignore_ascii_case("no-cache")));
    if no_cache {
        return false;
    }

    if let Some(none_match) = none_match.map(str::trim).filter(|tags| *tags != "*") {
        let Some(etag) = header_str(response, header::ETAG) else {
            return false;
        };
        let strong = etag.strip_prefix("W/").unwrap_or(etag);
        let matched = none_match.split(',').map(str::trim).any(|tag| tag.strip_prefix("W/").unwrap_or(tag) == strong);
        if !matched {
            return false;
        }
    }

    if let Some(modified_since) = modified_since {
        let last_modified = header_str(response, header::LAST_MODIFIED).and_then(parse_http_date);
        match (last_modified, parse_http_date(modified_since)) {
            (Some(last_modified), Some(modified_since)) if last_modified <= modified_since => {}
            _ => return false,
        }
    }

    true
}

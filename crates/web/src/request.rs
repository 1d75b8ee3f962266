use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, AsHeaderName};
use http::{HeaderMap, Method, Uri};
use mime::Mime;
use onion_http::protocol::RawRequest;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::template::Shared;

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// The request side of one exchange.
///
/// Method and url start as the raw request's and may be rewritten by
/// middleware; `original_url` never changes.
#[derive(Debug)]
pub struct Request {
    shared: Arc<Shared>,
    raw: RawRequest,
    method: Method,
    url: Uri,
    original_url: Uri,
}

impl Request {
    pub(crate) fn new(shared: Arc<Shared>, raw: RawRequest) -> Self {
        let method = raw.method().clone();
        let url = raw.uri().clone();
        let original_url = url.clone();
        Self { shared, raw, method, url, original_url }
    }

    pub fn raw(&self) -> &RawRequest {
        &self.raw
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// A value from the request template.
    pub fn shared<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.shared.templates.request.get::<T>()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn set_url(&mut self, url: Uri) {
        self.url = url;
    }

    pub fn original_url(&self) -> &Uri {
        &self.original_url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The query string without its leading `?`.
    pub fn querystring(&self) -> &str {
        self.url.query().unwrap_or("")
    }

    /// The query string with its leading `?`, or empty.
    pub fn search(&self) -> String {
        match self.url.query() {
            Some(query) if !query.is_empty() => format!("?{query}"),
            _ => String::new(),
        }
    }

    pub fn query<T: DeserializeOwned>(&self) -> Result<T, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(self.querystring())
    }

    pub fn headers(&self) -> &HeaderMap {
        self.raw.headers()
    }

    /// A header value, if present and visible ASCII.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.raw.headers().get(name).and_then(|value| value.to_str().ok())
    }

    /// `Host`, or `X-Forwarded-Host` when the proxy is trusted.
    pub fn host(&self) -> Option<&str> {
        let forwarded = if self.config().proxy { self.header(X_FORWARDED_HOST) } else { None };
        let host = forwarded
            .or_else(|| self.header(header::HOST))
            .or_else(|| self.url.authority().map(|authority| authority.as_str()))?;

        let host = host.split(',').next().unwrap_or_default().trim();
        if host.is_empty() { None } else { Some(host) }
    }

    /// The host without its port. IPv6 literals keep their brackets.
    pub fn hostname(&self) -> Option<&str> {
        let host = self.host()?;
        if host.starts_with('[') {
            return host.find(']').map(|end| &host[..=end]).or(Some(host));
        }
        host.split(':').next()
    }

    /// `X-Forwarded-Proto` when the proxy is trusted, else `http`.
    pub fn protocol(&self) -> &str {
        if !self.config().proxy {
            return "http";
        }
        self.header(X_FORWARDED_PROTO)
            .and_then(|proto| proto.split(',').next())
            .map(str::trim)
            .filter(|proto| !proto.is_empty())
            .unwrap_or("http")
    }

    pub fn secure(&self) -> bool {
        self.protocol() == "https"
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol(), self.host().unwrap_or_default())
    }

    /// The full request url, including protocol and host.
    pub fn href(&self) -> String {
        if self.original_url.scheme().is_some() {
            return self.original_url.to_string();
        }
        format!("{}{}", self.origin(), self.original_url)
    }

    /// Client addresses from the proxy ip header when the proxy is trusted.
    ///
    /// With a non-zero `max_ips_count` only the last that many entries are read.
    pub fn ips(&self) -> Vec<&str> {
        let config = self.config();
        if !config.proxy {
            return Vec::new();
        }

        let Some(value) = self.header(config.proxy_ip_header.as_str()) else {
            return Vec::new();
        };

        let ips: Vec<&str> = value.split(',').map(str::trim).filter(|ip| !ip.is_empty()).collect();
        if config.max_ips_count > 0 && ips.len() > config.max_ips_count {
            ips[ips.len() - config.max_ips_count..].to_vec()
        } else {
            ips
        }
    }

    /// The first of [`Request::ips`], else the peer address, else empty.
    pub fn ip(&self) -> String {
        if let Some(ip) = self.ips().first() {
            return (*ip).to_owned();
        }
        self.raw.remote_addr().map(|addr| addr.ip().to_string()).unwrap_or_default()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.raw.remote_addr()
    }

    /// Hostname labels, most significant first, minus the first
    /// `subdomain_offset` of them. Empty for ip hosts.
    pub fn subdomains(&self) -> Vec<&str> {
        let Some(hostname) = self.hostname() else {
            return Vec::new();
        };
        if hostname.starts_with('[') || hostname.parse::<IpAddr>().is_ok() {
            return Vec::new();
        }

        hostname.split('.').rev().skip(self.config().subdomain_offset).collect()
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.header(header::CONTENT_TYPE).and_then(|value| value.parse().ok())
    }

    pub fn length(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH).and_then(|value| value.trim().parse().ok())
    }

    pub fn version_major(&self) -> u8 {
        self.raw.version_major()
    }

    /// The buffered request body.
    pub fn body(&self) -> &Bytes {
        self.raw.body()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(self.raw.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request_with(config: Config, builder: http::request::Builder) -> Request {
        let raw = RawRequest::from(builder.body(Bytes::new()).unwrap());
        Request::new(Shared::new(config), raw)
    }

    fn trusted() -> Config {
        Config { proxy: true, ..Config::default() }
    }

    #[test]
    fn test_url_parts() {
        let mut request = request_with(Config::default(), http::Request::get("/users?page=2&sort=name"));
        assert_eq!(request.path(), "/users");
        assert_eq!(request.querystring(), "page=2&sort=name");
        assert_eq!(request.search(), "?page=2&sort=name");

        request.set_url(Uri::from_static("/rewritten"));
        assert_eq!(request.path(), "/rewritten");
        assert_eq!(request.search(), "");
        assert_eq!(request.original_url(), "/users?page=2&sort=name");
    }

    #[test]
    fn test_query() {
        #[derive(Deserialize)]
        struct Page {
            page: u32,
            sort: String,
        }

        let request = request_with(Config::default(), http::Request::get("/users?page=2&sort=name"));
        let page: Page = request.query().unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.sort, "name");
    }

    #[test]
    fn test_host_and_hostname() {
        let request = request_with(Config::default(), http::Request::get("/").header("host", "example.com:3000"));
        assert_eq!(request.host(), Some("example.com:3000"));
        assert_eq!(request.hostname(), Some("example.com"));
        assert_eq!(request.origin(), "http://example.com:3000");
        assert_eq!(request.href(), "http://example.com:3000/");

        let request = request_with(Config::default(), http::Request::get("/").header("host", "[::1]:8080"));
        assert_eq!(request.hostname(), Some("[::1]"));
        assert!(request.subdomains().is_empty());
    }

    #[test]
    fn test_forwarded_host_needs_trust() {
        let builder = || {
            http::Request::get("/")
                .header("host", "internal:8080")
                .header("x-forwarded-host", "public.example.com, proxy.local")
                .header("x-forwarded-proto", "https")
        };

        let request = request_with(Config::default(), builder());
        assert_eq!(request.host(), Some("internal:8080"));
        assert_eq!(request.protocol(), "http");
        assert!(!request.secure());

        let request = request_with(trusted(), builder());
        assert_eq!(request.host(), Some("public.example.com"));
        assert_eq!(request.protocol(), "https");
        assert!(request.secure());
    }

    #[test]
    fn test_ips() {
        let builder = || http::Request::get("/").header("x-forwarded-for", "10.0.0.1, 10.0.0.2 ,10.0.0.3");

        let request = request_with(Config::default(), builder());
        assert!(request.ips().is_empty());
        assert_eq!(request.ip(), "");

        let request = request_with(trusted(), builder());
        assert_eq!(request.ips(), vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(request.ip(), "10.0.0.1");

        let request = request_with(Config { max_ips_count: 2, ..trusted() }, builder());
        assert_eq!(request.ips(), vec!["10.0.0.2", "10.0.0.3"]);

        let config = Config { proxy_ip_header: "x-client-ip".into(), ..trusted() };
        let request = request_with(config, http::Request::get("/").header("x-client-ip", "192.168.1.9"));
        assert_eq!(request.ip(), "192.168.1.9");
    }

    #[test]
    fn test_ip_falls_back_to_peer() {
        let raw = RawRequest::from(http::Request::get("/").body(Bytes::new()).unwrap())
            .with_remote_addr(Some("127.0.0.1:4000".parse().unwrap()));
        let request = Request::new(Shared::new(Config::default()), raw);
        assert_eq!(request.ip(), "127.0.0.1");
    }

    #[test]
    fn test_subdomains() {
        let request = request_with(Config::default(), http::Request::get("/").header("host", "tobi.ferrets.example.com"));
        assert_eq!(request.subdomains(), vec!["ferrets", "tobi"]);

        let config = Config { subdomain_offset: 3, ..Config::default() };
        let request = request_with(config, http::Request::get("/").header("host", "tobi.ferrets.example.com"));
        assert_eq!(request.subdomains(), vec!["tobi"]);

        let request = request_with(Config::default(), http::Request::get("/").header("host", "192.168.0.1:80"));
        assert!(request.subdomains().is_empty());
    }

    #[test]
    fn test_body_accessors() {
        let raw = RawRequest::from(
            http::Request::post("/")
                .header("content-type", "application/json")
                .header("content-length", "9")
                .body(Bytes::from_static(br#"{"id":42}"#))
                .unwrap(),
        );
        let request = Request::new(Shared::new(Config::default()), raw);

        assert_eq!(request.content_type(), Some(mime::APPLICATION_JSON));
        assert_eq!(request.length(), Some(9));
        let value: serde_json::Value = request.json().unwrap();
        assert_eq!(value["id"], 42);
    }
}

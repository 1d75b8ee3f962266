use serde::Deserialize;
use serde_json::{Value, json};

/// Environment variable consulted for the default [`Config::env`].
pub const ENV_VAR: &str = "ONION_ENV";

const DEFAULT_ENV: &str = "development";
const DEFAULT_PROXY_IP_HEADER: &str = "X-Forwarded-For";
const DEFAULT_SUBDOMAIN_OFFSET: usize = 2;

/// Application wide settings, read by the request accessors and never
/// changed while a request is in flight.
///
/// Missing fields take their defaults when deserializing, so a host can load
/// a partial document:
///
/// ```
/// use onion_web::Config;
///
/// let config: Config = serde_json::from_str(r#"{ "proxy": true }"#).unwrap();
/// assert!(config.proxy);
/// assert_eq!(config.subdomain_offset, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: String,
    /// Trust `X-Forwarded-*` headers.
    pub proxy: bool,
    pub subdomain_offset: usize,
    pub proxy_ip_header: String,
    /// How many entries of the proxy IP header to read, counted from the end.
    /// Zero reads all of them.
    pub max_ips_count: usize,
    /// Stored and exposed only; nothing signs with them.
    pub keys: Option<Vec<String>>,
    /// Keep the default error listener quiet.
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: std::env::var(ENV_VAR).unwrap_or_else(|_e| DEFAULT_ENV.to_owned()),
            proxy: false,
            subdomain_offset: DEFAULT_SUBDOMAIN_OFFSET,
            proxy_ip_header: DEFAULT_PROXY_IP_HEADER.to_owned(),
            max_ips_count: 0,
            keys: None,
            silent: false,
        }
    }
}

impl Config {
    /// The public summary of the settings.
    pub fn to_json(&self) -> Value {
        json!({
            "subdomainOffset": self.subdomain_offset,
            "proxy": self.proxy,
            "env": self.env,
        })
    }
}

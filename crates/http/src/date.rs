//! HTTP `Date` header values.
//!
//! Formatting an IMF-fixdate on every response is wasteful, so the current
//! value is cached and only reformatted once it is older than the refresh
//! interval. Readers never block each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;
use tracing::warn;

const REFRESH_INTERVAL: Duration = Duration::from_millis(800);

#[derive(Debug)]
struct CachedDate {
    formatted_at: Instant,
    value: HeaderValue,
}

/// Keeps a recently formatted `Date` header value.
#[derive(Debug)]
pub struct DateService {
    current: ArcSwap<CachedDate>,
    refresh_interval: Duration,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::with_refresh_interval(REFRESH_INTERVAL));

impl DateService {
    /// The process wide instance used by every connection.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    fn with_refresh_interval(refresh_interval: Duration) -> Self {
        Self { current: ArcSwap::from_pointee(format_now()), refresh_interval }
    }

    /// The current date as a header value, at most one refresh interval old.
    pub fn http_date(&self) -> HeaderValue {
        let cached = self.current.load();
        if cached.formatted_at.elapsed() < self.refresh_interval {
            return cached.value.clone();
        }

        let fresh = Arc::new(format_now());
        let value = fresh.value.clone();
        self.current.store(fresh);
        value
    }
}

fn format_now() -> CachedDate {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);

    let value = HeaderValue::from_maybe_shared(Bytes::copy_from_slice(&buf)).unwrap_or_else(|e| {
        warn!(cause = %e, "formatted date is not a valid header value");
        HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 GMT")
    });

    CachedDate { formatted_at: Instant::now(), value }
}

//! Shared libcurl setup for the probe and for every fetch.

use std::collections::HashMap;
use std::time::Duration;

/// Where to fetch from: URL plus extra request headers.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Per-transfer curl tuning.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    /// Receive buffer size; each write callback delivers at most this many bytes.
    pub buffer_size: usize,
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `low_speed_limit` B/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Optional receive cap in bytes per second, per transfer.
    pub max_recv_speed: Option<u64>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            buffer_size: 32 * 1024,
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            max_recv_speed: None,
        }
    }
}

/// Build an Easy handle for `source`: URL, redirects, timeouts, buffer and headers.
pub(crate) fn easy_for(source: &Source, opts: &CurlOptions) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(&source.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.low_speed_limit(opts.low_speed_limit)?;
    easy.low_speed_time(opts.low_speed_time)?;
    easy.buffer_size(opts.buffer_size)?;
    if let Some(speed) = opts.max_recv_speed {
        easy.max_recv_speed(speed)?;
    }
    if !source.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &source.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }
    Ok(easy)
}

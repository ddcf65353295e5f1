//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body. Every request line (plus its `Range` header,
//! if any) is recorded so tests can check what went over the wire.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Send `Accept-Ranges: bytes`, whether or not ranges actually work.
    pub advertise_ranges: bool,
    /// Close the connection without any response for a ranged GET starting here.
    pub fail_range_start: Option<u64>,
    /// Send the first half of every ranged body, then stall this long before the rest.
    pub stall: Option<Duration>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            fail_range_start: None,
            stall: None,
        }
    }
}

/// One request as seen by the server: method and raw `Range` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub method: String,
    pub range: Option<String>,
}

pub struct RangeServer {
    pub url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl RangeServer {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// `Range` values of all GETs, sorted.
    pub fn get_ranges(&self) -> Vec<String> {
        let mut ranges: Vec<String> = self
            .requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .filter_map(|r| r.range)
            .collect();
        ranges.sort();
        ranges
    }
}

/// Starts a server in a background thread serving `body`.
/// The server runs until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_srv = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let seen = Arc::clone(&seen_srv);
            thread::spawn(move || handle(stream, &body, opts, &seen));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/data.bin", port),
        seen,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, seen: &Mutex<Vec<SeenRequest>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range_raw) = parse_request(request);
    seen.lock().unwrap().push(SeenRequest {
        method: method.to_string(),
        range: range_raw.clone(),
    });

    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n",
            total, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let range = range_raw.as_deref().and_then(parse_range);
    let ranged = match range {
        Some((start, end_incl)) if opts.support_ranges => Some((start, end_incl)),
        _ => None,
    };
    let Some((start, end_incl)) = ranged else {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n",
            total, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(body);
        return;
    };

    if opts.fail_range_start == Some(start) {
        // Drop the connection: the client sees an empty reply.
        return;
    }

    let end_incl = end_incl.min(total.saturating_sub(1));
    if start > end_incl {
        let response = format!(
            "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n\r\n",
            total
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    let slice = &body[start as usize..=end_incl as usize];
    let response = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n{}\r\n",
        slice.len(),
        start,
        end_incl,
        total,
        accept_ranges
    );
    let _ = stream.write_all(response.as_bytes());
    match opts.stall {
        Some(pause) => {
            let half = slice.len() / 2;
            let _ = stream.write_all(&slice[..half]);
            let _ = stream.flush();
            thread::sleep(pause);
            let _ = stream.write_all(&slice[half..]);
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
}

/// Returns (method, raw `Range` header value).
fn parse_request(request: &str) -> (&str, Option<String>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_string());
            }
        }
    }
    (method, range)
}

/// `bytes=X-Y` → (X, Y); `bytes=X-` → (X, u64::MAX).
fn parse_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (a, b) = spec.split_once('-')?;
    let start = a.trim().parse::<u64>().ok()?;
    let end = match b.trim() {
        "" => u64::MAX,
        s => s.parse::<u64>().ok()?,
    };
    Some((start, end))
}
